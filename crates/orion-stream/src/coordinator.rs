//! Synchronous coordination core: correlation, early-event buffering, delta
//! coalescing, and submission bookkeeping around one [`StreamMachine`].
//!
//! Nothing here performs I/O. The async driver in [`crate::runtime`] (or any
//! host loop) calls these methods in order and publishes a fresh
//! [`StreamView`] whenever a call reports [`Publish::Now`].

use std::collections::VecDeque;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::coalesce::DeltaBatcher;
use crate::config::{ConfigError, CoordinatorConfig};
use crate::correlator;
use crate::errors::{ErrorInfo, SubmitError};
use crate::event::{EventPayload, InboundEvent};
use crate::ids::{RequestId, SessionId};
use crate::machine::{Action, MachineState, StreamMachine};
use crate::submit::{SubmitAck, SubmitOutcome};
use crate::turn::{ConversationTurn, TurnValidationError};
use crate::view::StreamView;

/// Distinct request ids that may hold early events at once.
const EARLY_REQUEST_SLOTS: usize = 8;
/// Ids of earlier requests remembered so their late events are never held.
const RETIRED_REQUEST_IDS: usize = 16;

/// Whether the caller should publish a new view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Publish {
    /// Visible state changed; publish immediately.
    Now,
    /// Deltas were buffered; they will surface on the next tick.
    Deferred,
    /// Nothing changed.
    Nothing,
}

/// A submission the host must hand to the [`Submitter`](crate::submit::Submitter).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingSubmit {
    pub epoch: u64,
    pub prompt: String,
    /// Effective session: the one supplied, or the one carried over.
    pub session_id: Option<SessionId>,
}

#[derive(Debug)]
pub struct StreamCoordinator {
    config: CoordinatorConfig,
    machine: StreamMachine,
    batcher: DeltaBatcher,
    /// Events that arrived before the ack, queued per request id.
    early: IndexMap<RequestId, VecDeque<InboundEvent>>,
    retired: VecDeque<RequestId>,
    epoch: u64,
    pending_epoch: Option<u64>,
}

impl StreamCoordinator {
    pub fn new(config: CoordinatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            machine: StreamMachine::new(),
            batcher: DeltaBatcher::new(),
            early: IndexMap::new(),
            retired: VecDeque::new(),
            epoch: 0,
            pending_epoch: None,
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn machine(&self) -> &StreamMachine {
        &self.machine
    }

    pub fn state(&self) -> MachineState {
        self.machine.state()
    }

    /// The published view. Buffered deltas are not visible until flushed.
    pub fn view(&self) -> StreamView {
        StreamView::from_machine(&self.machine)
    }

    pub fn has_pending_deltas(&self) -> bool {
        !self.batcher.is_empty()
    }

    /// True while a submission has been handed out but not yet resolved.
    pub fn awaiting_ack(&self) -> bool {
        self.pending_epoch.is_some()
    }

    /// Starts a new request. Returns `None` when a request is already in
    /// flight; the second submit is dropped rather than queued.
    pub fn begin_submit(
        &mut self,
        prompt: impl Into<String>,
        session_id: Option<SessionId>,
    ) -> Option<PendingSubmit> {
        let prompt = prompt.into();
        if self.machine.state().is_busy() {
            debug!(state = %self.machine.state(), "submit ignored while a request is in flight");
            return None;
        }
        let previous = self.machine.request_id().cloned();
        let transition = self.machine.dispatch(Action::Submit {
            prompt: prompt.clone(),
            session_id,
        });
        if !transition.applied {
            return None;
        }
        if let Some(id) = previous {
            self.retire(id);
        }
        self.batcher.clear();
        self.early.clear();
        self.epoch += 1;
        self.pending_epoch = Some(self.epoch);
        info!(epoch = self.epoch, "submitting prompt");
        Some(PendingSubmit {
            epoch: self.epoch,
            prompt,
            session_id: self.machine.session_id().cloned(),
        })
    }

    /// Resolves the submission started by [`begin_submit`](Self::begin_submit).
    ///
    /// A result for a superseded epoch is discarded. On success, events that
    /// arrived before the acknowledgement and carry the acknowledged id are
    /// replayed in arrival order.
    pub fn finish_submit(
        &mut self,
        epoch: u64,
        result: Result<SubmitAck, SubmitError>,
    ) -> SubmitOutcome {
        if self.pending_epoch != Some(epoch) {
            debug!(epoch, current = self.epoch, "stale submission result discarded");
            return SubmitOutcome::Ignored;
        }
        self.pending_epoch = None;

        let ack = match result {
            Ok(ack) if !ack.request_id.is_blank() => ack,
            Ok(_) => {
                return self.fail_submit(SubmitError::protocol(
                    "backend returned a blank request id",
                ));
            }
            Err(err) => return self.fail_submit(err),
        };

        let request_id = ack.request_id;
        self.machine
            .dispatch(Action::RequestAcknowledged(request_id.clone()));

        let own = self.early.shift_remove(&request_id).unwrap_or_default();
        let discarded: usize = self.early.values().map(VecDeque::len).sum();
        self.early.clear();
        let replayed = own.len();
        for event in own {
            if correlator::accepts(&event, self.machine.request_id()) {
                self.apply_event(event);
            }
        }
        // Buffered text must be visible once the ack publishes.
        self.flush();
        if replayed > 0 || discarded > 0 {
            debug!(request_id = %request_id, replayed, discarded, "resolved early events");
        }
        SubmitOutcome::Accepted(request_id)
    }

    fn fail_submit(&mut self, err: SubmitError) -> SubmitOutcome {
        warn!(error = %err, "submission failed");
        self.early.clear();
        let info = ErrorInfo::send_failed(&err);
        self.flush();
        self.machine.dispatch(Action::Fail(info.clone()));
        SubmitOutcome::Failed(info)
    }

    /// Routes one inbound event through correlation into the machine.
    pub fn handle_event(&mut self, event: InboundEvent) -> Publish {
        if event.request_id.is_blank() {
            debug!(kind = event.payload.kind(), "event without request id dropped");
            return Publish::Nothing;
        }
        if self.pending_epoch.is_some() && self.machine.request_id().is_none() {
            self.hold_early(event);
            return Publish::Nothing;
        }
        if !correlator::accepts(&event, self.machine.request_id()) {
            debug!(
                request_id = %event.request_id,
                active = ?self.machine.request_id().map(|id| id.as_str()),
                kind = event.payload.kind(),
                "uncorrelated event dropped"
            );
            return Publish::Nothing;
        }
        self.apply_event(event)
    }

    /// Queues an event that arrived before the ack.
    ///
    /// Each request id gets its own bounded queue so a flood from one id can
    /// never displace another id's events. Ids of earlier requests are
    /// dropped outright since they can never become active again.
    fn hold_early(&mut self, event: InboundEvent) {
        if self.retired.contains(&event.request_id) {
            debug!(
                request_id = %event.request_id,
                kind = event.payload.kind(),
                "late event from an earlier request dropped"
            );
            return;
        }
        if !self.early.contains_key(&event.request_id)
            && self.early.len() >= EARLY_REQUEST_SLOTS
        {
            warn!(
                request_id = %event.request_id,
                slots = EARLY_REQUEST_SLOTS,
                "too many request ids before acknowledgement, dropping event"
            );
            return;
        }
        let capacity = self.config.early_event_capacity;
        let queue = self.early.entry(event.request_id.clone()).or_default();
        if queue.len() >= capacity {
            warn!(
                request_id = %event.request_id,
                capacity,
                "early event queue full, dropping newest"
            );
            return;
        }
        queue.push_back(event);
    }

    fn retire(&mut self, request_id: RequestId) {
        if self.retired.contains(&request_id) {
            return;
        }
        if self.retired.len() >= RETIRED_REQUEST_IDS {
            self.retired.pop_front();
        }
        self.retired.push_back(request_id);
    }

    fn apply_event(&mut self, event: InboundEvent) -> Publish {
        match event.payload {
            EventPayload::TextChunk {
                content_type,
                content,
            } if self.config.coalesce_text
                && self.machine.state() == MachineState::Streaming =>
            {
                if self.batcher.push(content_type, &content) {
                    self.flush();
                    Publish::Now
                } else {
                    Publish::Deferred
                }
            }
            payload => {
                let flushed = self.flush();
                let transition = self.machine.dispatch(Action::from(payload));
                if flushed || transition.applied {
                    Publish::Now
                } else {
                    Publish::Nothing
                }
            }
        }
    }

    /// Applies buffered deltas to the machine. Returns true if the snapshot changed.
    pub fn flush(&mut self) -> bool {
        let mut changed = false;
        for (kind, content) in self.batcher.drain() {
            changed |= self
                .machine
                .dispatch(Action::TextChunk { kind, content })
                .applied;
        }
        changed
    }

    /// Frame tick from the host loop; publish when this returns true.
    pub fn tick(&mut self) -> bool {
        self.flush()
    }

    /// Dismisses a finished request. Ignored while a request is in flight.
    pub fn reset(&mut self) -> bool {
        let previous = self.machine.request_id().cloned();
        let transition = self.machine.dispatch(Action::Reset);
        if transition.applied {
            if let Some(id) = previous {
                self.retire(id);
            }
            self.batcher.clear();
            self.early.clear();
            self.pending_epoch = None;
        }
        transition.applied
    }

    /// Record of the finished exchange for an external persistence layer.
    /// Only available in `complete`.
    pub fn completed_turn(
        &self,
        conversation_id: impl Into<String>,
    ) -> Option<Result<ConversationTurn, TurnValidationError>> {
        ConversationTurn::from_machine(&self.machine, conversation_id, chrono::Utc::now())
    }
}
