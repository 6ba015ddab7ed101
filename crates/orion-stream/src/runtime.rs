//! Async driver that owns a [`StreamCoordinator`] on a tokio task.
//!
//! Inbound events, submission results, host commands and the frame ticker are
//! multiplexed with `tokio::select!`. Every visible change is published on a
//! `watch` channel so renderers only ever see the latest [`StreamView`].

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::CoordinatorConfig;
use crate::coordinator::{Publish, StreamCoordinator};
use crate::errors::{CoordinatorError, SubmitError};
use crate::event::InboundEvent;
use crate::ids::SessionId;
use crate::submit::{SubmitAck, SubmitOutcome, Submitter};
use crate::turn::{ConversationTurn, TurnValidationError};
use crate::view::StreamView;

type TurnReply = Option<Result<ConversationTurn, TurnValidationError>>;

enum Command {
    Submit {
        prompt: String,
        session_id: Option<SessionId>,
        reply: oneshot::Sender<SubmitOutcome>,
    },
    Reset {
        reply: oneshot::Sender<bool>,
    },
    CompletedTurn {
        conversation_id: String,
        reply: oneshot::Sender<TurnReply>,
    },
    Shutdown,
}

/// Cloneable handle to a running coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
    events: mpsc::Sender<InboundEvent>,
    views: watch::Receiver<StreamView>,
}

impl CoordinatorHandle {
    /// Submits a prompt and waits until the backend acknowledges or fails it.
    ///
    /// Returns [`SubmitOutcome::Ignored`] while another request is in flight.
    pub async fn submit(
        &self,
        prompt: impl Into<String>,
        session_id: Option<SessionId>,
    ) -> Result<SubmitOutcome, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Submit {
            prompt: prompt.into(),
            session_id,
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    /// Dismisses a completed or failed request. Returns false when ignored.
    pub async fn reset(&self) -> Result<bool, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reset { reply }).await?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    pub async fn completed_turn(
        &self,
        conversation_id: impl Into<String>,
    ) -> Result<TurnReply, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::CompletedTurn {
            conversation_id: conversation_id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    /// Delivers one backend event. Waits when the inbound buffer is full.
    pub async fn push_event(&self, event: InboundEvent) -> Result<(), CoordinatorError> {
        self.events
            .send(event)
            .await
            .map_err(|_| CoordinatorError::Closed)
    }

    /// Sender for transport tasks that forward events directly.
    pub fn event_sink(&self) -> mpsc::Sender<InboundEvent> {
        self.events.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamView> {
        self.views.clone()
    }

    /// Latest published view.
    pub fn view(&self) -> StreamView {
        self.views.borrow().clone()
    }

    /// Waits until a published view satisfies `predicate`.
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&StreamView) -> bool,
    ) -> Result<StreamView, CoordinatorError> {
        let mut views = self.views.clone();
        let view = views
            .wait_for(predicate)
            .await
            .map_err(|_| CoordinatorError::Closed)?;
        Ok(view.clone())
    }

    /// Stops the driver task. Pending deltas are flushed first.
    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> Result<(), CoordinatorError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoordinatorError::Closed)
    }
}

/// Starts the coordinator on the current tokio runtime.
pub fn spawn_coordinator(
    config: CoordinatorConfig,
    submitter: Arc<dyn Submitter>,
) -> Result<(CoordinatorHandle, JoinHandle<()>), CoordinatorError> {
    let coordinator = StreamCoordinator::new(config.clone())?;
    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(config.event_buffer_capacity);
    let (view_tx, view_rx) = watch::channel(coordinator.view());

    let task = tokio::spawn(drive(coordinator, submitter, command_rx, event_rx, view_tx));
    Ok((
        CoordinatorHandle {
            commands: command_tx,
            events: event_tx,
            views: view_rx,
        },
        task,
    ))
}

async fn drive(
    mut coordinator: StreamCoordinator,
    submitter: Arc<dyn Submitter>,
    mut commands: mpsc::Receiver<Command>,
    mut events: mpsc::Receiver<InboundEvent>,
    views: watch::Sender<StreamView>,
) {
    let (ack_tx, mut acks) = mpsc::channel::<(u64, Result<SubmitAck, SubmitError>)>(4);
    let mut waiting: Option<(u64, oneshot::Sender<SubmitOutcome>)> = None;
    let mut events_open = true;
    let mut ticker = tokio::time::interval(coordinator.config().frame_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        frame_interval_ms = coordinator.config().frame_interval_ms,
        coalesce = coordinator.config().coalesce_text,
        "stream coordinator started"
    );

    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(Command::Submit { prompt, session_id, reply }) => {
                        let Some(pending) = coordinator.begin_submit(prompt, session_id) else {
                            let _ = reply.send(SubmitOutcome::Ignored);
                            continue;
                        };
                        publish(&views, &coordinator);
                        waiting = Some((pending.epoch, reply));
                        let submitter = submitter.clone();
                        let ack_tx = ack_tx.clone();
                        tokio::spawn(async move {
                            let result = submitter
                                .submit(&pending.prompt, pending.session_id.as_ref())
                                .await;
                            let _ = ack_tx.send((pending.epoch, result)).await;
                        });
                    }
                    Some(Command::Reset { reply }) => {
                        let applied = coordinator.reset();
                        if applied {
                            publish(&views, &coordinator);
                        }
                        let _ = reply.send(applied);
                    }
                    Some(Command::CompletedTurn { conversation_id, reply }) => {
                        let _ = reply.send(coordinator.completed_turn(conversation_id));
                    }
                    Some(Command::Shutdown) | None => break,
                }
            }
            Some((epoch, result)) = acks.recv() => {
                let outcome = coordinator.finish_submit(epoch, result);
                if outcome != SubmitOutcome::Ignored {
                    publish(&views, &coordinator);
                }
                if waiting.as_ref().is_some_and(|(pending, _)| *pending == epoch)
                    && let Some((_, reply)) = waiting.take()
                {
                    let _ = reply.send(outcome);
                }
            }
            event = events.recv(), if events_open => {
                match event {
                    Some(event) => {
                        if coordinator.handle_event(event) == Publish::Now {
                            publish(&views, &coordinator);
                        }
                    }
                    None => {
                        debug!("inbound event channel closed");
                        events_open = false;
                    }
                }
            }
            _ = ticker.tick(), if coordinator.has_pending_deltas() => {
                if coordinator.tick() {
                    publish(&views, &coordinator);
                }
            }
        }
    }

    if coordinator.flush() {
        publish(&views, &coordinator);
    }
    info!(state = %coordinator.state(), "stream coordinator stopped");
}

fn publish(views: &watch::Sender<StreamView>, coordinator: &StreamCoordinator) {
    views.send_replace(coordinator.view());
}
