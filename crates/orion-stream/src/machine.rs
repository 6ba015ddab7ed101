//! The authoritative request state machine.
//!
//! `StreamMachine` is the only owner of [`MachineState`] and the
//! [`StreamSnapshot`]. Every change goes through [`StreamMachine::dispatch`];
//! an action that is not legal in the current state is ignored and reported
//! as such in the returned [`Transition`], never as an error.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::accumulator;
use crate::errors::ErrorInfo;
use crate::event::{ContentKind, EventPayload};
use crate::ids::{RequestId, SessionId, ToolId};
use crate::snapshot::{Completion, StreamSnapshot};

/// Mutually exclusive machine states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineState {
    #[default]
    Idle,
    Sending,
    Streaming,
    Complete,
    Error,
}

impl MachineState {
    pub const ALL: [MachineState; 5] = [
        MachineState::Idle,
        MachineState::Sending,
        MachineState::Streaming,
        MachineState::Complete,
        MachineState::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Streaming => "streaming",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// A request is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }

    /// `complete` and `error` only exit through an explicit submit or reset.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the machine.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Submit {
        prompt: String,
        session_id: Option<SessionId>,
    },
    RequestAcknowledged(RequestId),
    TextChunk {
        kind: ContentKind,
        content: String,
    },
    ToolStart {
        tool_id: ToolId,
        name: String,
        input: serde_json::Map<String, serde_json::Value>,
    },
    ToolComplete {
        tool_id: ToolId,
        is_error: bool,
        duration_ms: u64,
        result: Option<serde_json::Value>,
    },
    Complete(Completion),
    Fail(ErrorInfo),
    Reset,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Submit { .. } => "submit",
            Self::RequestAcknowledged(_) => "request_acknowledged",
            Self::TextChunk {
                kind: ContentKind::Text,
                ..
            } => "text_chunk",
            Self::TextChunk {
                kind: ContentKind::Thinking,
                ..
            } => "thinking_chunk",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolComplete { .. } => "tool_complete",
            Self::Complete(_) => "complete",
            Self::Fail(_) => "fail",
            Self::Reset => "reset",
        }
    }
}

impl From<EventPayload> for Action {
    fn from(payload: EventPayload) -> Self {
        match payload {
            EventPayload::TextChunk {
                content_type,
                content,
            } => Action::TextChunk {
                kind: content_type,
                content,
            },
            EventPayload::ToolStart {
                tool_id,
                tool_name,
                input,
            } => Action::ToolStart {
                tool_id,
                name: tool_name,
                input,
            },
            EventPayload::ToolComplete {
                tool_id,
                result,
                is_error,
                duration_ms,
            } => Action::ToolComplete {
                tool_id,
                is_error,
                duration_ms,
                result: Some(result),
            },
            EventPayload::SessionComplete {
                total_tokens,
                cost_usd,
                duration_ms,
            } => Action::Complete(Completion {
                total_tokens,
                cost_usd,
                duration_ms,
            }),
            EventPayload::SessionError {
                code,
                message,
                recoverable,
            } => Action::Fail(ErrorInfo {
                code,
                message,
                recoverable,
            }),
        }
    }
}

/// Outcome of one dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: MachineState,
    pub to: MachineState,
    /// False when the action was ignored or left everything unchanged.
    pub applied: bool,
}

impl Transition {
    fn ignored(state: MachineState) -> Self {
        Self {
            from: state,
            to: state,
            applied: false,
        }
    }

    pub fn state_changed(&self) -> bool {
        self.from != self.to
    }
}

/// State machine for one active request at a time.
#[derive(Debug, Default)]
pub struct StreamMachine {
    state: MachineState,
    snapshot: Arc<StreamSnapshot>,
    request_id: Option<RequestId>,
    session_id: Option<SessionId>,
    prompt: Option<String>,
}

impl StreamMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn snapshot(&self) -> &StreamSnapshot {
        &self.snapshot
    }

    /// Cheap shared handle to the current snapshot. Later mutations copy on
    /// write, so the handle stays a consistent view.
    pub fn shared_snapshot(&self) -> Arc<StreamSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Id used to correlate inbound events; `None` until acknowledged.
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Prompt of the current (or last finished) request.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn dispatch(&mut self, action: Action) -> Transition {
        let from = self.state;
        let name = action.name();
        let transition = match (from, action) {
            (
                MachineState::Idle | MachineState::Complete | MachineState::Error,
                Action::Submit { prompt, session_id },
            ) => {
                self.clear_snapshot();
                self.request_id = None;
                if session_id.is_some() {
                    self.session_id = session_id;
                }
                self.prompt = Some(prompt);
                self.enter(MachineState::Sending)
            }
            (MachineState::Sending | MachineState::Streaming, Action::RequestAcknowledged(id)) => {
                if id.is_blank() || self.request_id.is_some() {
                    Transition::ignored(from)
                } else {
                    self.request_id = Some(id);
                    Transition {
                        from,
                        to: from,
                        applied: true,
                    }
                }
            }
            (
                MachineState::Sending | MachineState::Streaming,
                Action::TextChunk { kind, content },
            ) => {
                let changed =
                    accumulator::apply_text_chunk(Arc::make_mut(&mut self.snapshot), kind, &content);
                self.stream_step(changed)
            }
            (
                MachineState::Sending | MachineState::Streaming,
                Action::ToolStart {
                    tool_id,
                    name,
                    input,
                },
            ) => {
                let changed = accumulator::apply_tool_start(
                    Arc::make_mut(&mut self.snapshot),
                    tool_id,
                    name,
                    input,
                );
                self.stream_step(changed)
            }
            (
                MachineState::Streaming,
                Action::ToolComplete {
                    tool_id,
                    is_error,
                    duration_ms,
                    result,
                },
            ) => {
                // Look before make_mut so an ignored completion does not clone
                // a snapshot that other views still share.
                let known = self
                    .snapshot
                    .tools
                    .get(&tool_id)
                    .is_some_and(|tool| !tool.status.is_finished());
                let changed = known
                    && accumulator::apply_tool_complete(
                        Arc::make_mut(&mut self.snapshot),
                        &tool_id,
                        is_error,
                        duration_ms,
                        result,
                    );
                Transition {
                    from,
                    to: from,
                    applied: changed,
                }
            }
            (MachineState::Streaming, Action::Complete(completion)) => {
                accumulator::apply_completion(Arc::make_mut(&mut self.snapshot), completion);
                self.enter(MachineState::Complete)
            }
            (MachineState::Sending | MachineState::Streaming, Action::Fail(error)) => {
                accumulator::apply_error(Arc::make_mut(&mut self.snapshot), error);
                self.enter(MachineState::Error)
            }
            (MachineState::Complete | MachineState::Error, Action::Reset) => {
                self.clear_snapshot();
                self.request_id = None;
                self.session_id = None;
                self.prompt = None;
                self.enter(MachineState::Idle)
            }
            _ => Transition::ignored(from),
        };

        if transition.state_changed() {
            info!(
                from = %transition.from,
                to = %transition.to,
                action = name,
                request_id = ?self.request_id.as_ref().map(RequestId::as_str),
                "stream state transition"
            );
        } else if !transition.applied {
            debug!(state = %from, action = name, "action ignored");
        }
        transition
    }

    fn enter(&mut self, to: MachineState) -> Transition {
        let from = self.state;
        self.state = to;
        Transition {
            from,
            to,
            applied: true,
        }
    }

    /// First content moves `sending` to `streaming` even when the content
    /// itself was empty.
    fn stream_step(&mut self, changed: bool) -> Transition {
        if self.state == MachineState::Sending {
            self.enter(MachineState::Streaming)
        } else {
            Transition {
                from: self.state,
                to: self.state,
                applied: changed,
            }
        }
    }

    fn clear_snapshot(&mut self) {
        if !self.snapshot.is_empty() {
            self.snapshot = Arc::new(StreamSnapshot::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SEND_FAILED;
    use crate::snapshot::ToolState;
    use serde_json::json;

    fn submit(prompt: &str) -> Action {
        Action::Submit {
            prompt: prompt.into(),
            session_id: None,
        }
    }

    fn text(content: &str) -> Action {
        Action::TextChunk {
            kind: ContentKind::Text,
            content: content.into(),
        }
    }

    fn fail(code: &str) -> Action {
        Action::Fail(ErrorInfo::new(code, "boom", true))
    }

    fn tool_start(id: &str) -> Action {
        let mut input = serde_json::Map::new();
        input.insert("file_path".into(), json!("/a.txt"));
        Action::ToolStart {
            tool_id: ToolId::new(id),
            name: "Read".into(),
            input,
        }
    }

    fn tool_complete(id: &str) -> Action {
        Action::ToolComplete {
            tool_id: ToolId::new(id),
            is_error: false,
            duration_ms: 120,
            result: None,
        }
    }

    fn complete() -> Action {
        Action::Complete(Completion {
            total_tokens: 42,
            cost_usd: 0.002,
            duration_ms: 850,
        })
    }

    /// One representative action per kind, used for exhaustive enumeration.
    fn every_action() -> Vec<Action> {
        vec![
            submit("again"),
            Action::RequestAcknowledged(RequestId::new("req-x")),
            text("t"),
            Action::TextChunk {
                kind: ContentKind::Thinking,
                content: "th".into(),
            },
            tool_start("tx"),
            tool_complete("tx"),
            complete(),
            fail("E"),
            Action::Reset,
        ]
    }

    /// Drives a fresh machine into `state` through legal transitions only.
    fn machine_in(state: MachineState) -> StreamMachine {
        let mut m = StreamMachine::new();
        match state {
            MachineState::Idle => {}
            MachineState::Sending => {
                m.dispatch(submit("p"));
            }
            MachineState::Streaming => {
                m.dispatch(submit("p"));
                m.dispatch(text("x"));
            }
            MachineState::Complete => {
                m.dispatch(submit("p"));
                m.dispatch(text("x"));
                m.dispatch(complete());
            }
            MachineState::Error => {
                m.dispatch(submit("p"));
                m.dispatch(fail("E"));
            }
        }
        assert_eq!(m.state(), state);
        m
    }

    #[test]
    fn hello_scenario_runs_to_complete() {
        let mut m = StreamMachine::new();
        assert_eq!(m.dispatch(submit("hello")).to, MachineState::Sending);

        m.dispatch(Action::RequestAcknowledged(RequestId::new("req-1")));
        assert_eq!(m.state(), MachineState::Sending);
        assert_eq!(m.request_id(), Some(&RequestId::new("req-1")));

        m.dispatch(text("Hi"));
        assert_eq!(m.state(), MachineState::Streaming);
        assert_eq!(m.snapshot().text, "Hi");

        m.dispatch(text(" there"));
        assert_eq!(m.state(), MachineState::Streaming);
        assert_eq!(m.snapshot().text, "Hi there");

        m.dispatch(complete());
        assert_eq!(m.state(), MachineState::Complete);
        assert_eq!(
            m.snapshot().completion,
            Some(Completion {
                total_tokens: 42,
                cost_usd: 0.002,
                duration_ms: 850
            })
        );
    }

    #[test]
    fn tool_start_is_first_content_and_completes_in_place() {
        let mut m = machine_in(MachineState::Sending);
        m.dispatch(tool_start("t1"));
        assert_eq!(m.state(), MachineState::Streaming);
        let tool = m.snapshot().tool("t1").unwrap();
        assert_eq!(tool.name, "Read");
        assert_eq!(tool.input.get("file_path"), Some(&json!("/a.txt")));
        assert_eq!(tool.status, ToolState::Running);

        assert!(m.dispatch(tool_complete("t1")).applied);
        let tool = m.snapshot().tool("t1").unwrap();
        assert_eq!(tool.status, ToolState::Complete);
        assert_eq!(tool.duration_ms, Some(120));
    }

    #[test]
    fn unknown_tool_complete_is_ignored_without_copying() {
        let mut m = machine_in(MachineState::Streaming);
        let before = m.shared_snapshot();
        let t = m.dispatch(tool_complete("ghost"));
        assert!(!t.applied);
        assert!(Arc::ptr_eq(&before, &m.shared_snapshot()));
        assert!(m.snapshot().tools.is_empty());
    }

    #[test]
    fn only_submit_leaves_idle() {
        for action in every_action() {
            let is_submit = matches!(action, Action::Submit { .. });
            let mut m = StreamMachine::new();
            let t = m.dispatch(action);
            assert_eq!(t.state_changed(), is_submit);
            if !is_submit {
                assert_eq!(m.state(), MachineState::Idle);
                assert!(m.snapshot().is_empty());
            }
        }
    }

    #[test]
    fn error_is_only_reachable_from_sending_or_streaming() {
        for state in MachineState::ALL {
            for action in every_action() {
                let mut m = machine_in(state);
                let t = m.dispatch(action.clone());
                if t.to == MachineState::Error && t.state_changed() {
                    assert!(
                        matches!(state, MachineState::Sending | MachineState::Streaming),
                        "{state} --{}--> error",
                        action.name()
                    );
                }
            }
        }
    }

    #[test]
    fn transition_table_is_exhaustive() {
        use MachineState::*;
        let expected = |state: MachineState, action: &Action| -> MachineState {
            match (state, action) {
                (Idle | Complete | Error, Action::Submit { .. }) => Sending,
                (Sending, Action::TextChunk { .. } | Action::ToolStart { .. }) => Streaming,
                (Sending | Streaming, Action::Fail(_)) => Error,
                (Streaming, Action::Complete(_)) => Complete,
                (Complete | Error, Action::Reset) => Idle,
                (s, _) => s,
            }
        };
        for state in MachineState::ALL {
            for action in every_action() {
                let mut m = machine_in(state);
                let want = expected(state, &action);
                let t = m.dispatch(action.clone());
                assert_eq!(t.to, want, "{state} --{}-->", action.name());
                assert_eq!(m.state(), want);
            }
        }
    }

    #[test]
    fn submit_while_busy_is_ignored() {
        for state in [MachineState::Sending, MachineState::Streaming] {
            let mut m = machine_in(state);
            let before = m.snapshot().clone();
            let t = m.dispatch(submit("second"));
            assert!(!t.applied);
            assert_eq!(m.state(), state);
            assert_eq!(m.snapshot(), &before);
            assert_eq!(m.prompt(), Some("p"));
        }
    }

    #[test]
    fn resubmit_from_error_clears_snapshot() {
        let mut m = StreamMachine::new();
        m.dispatch(submit("first"));
        m.dispatch(Action::RequestAcknowledged(RequestId::new("req-1")));
        m.dispatch(text("partial"));
        m.dispatch(tool_start("t1"));
        m.dispatch(fail(SEND_FAILED));
        assert_eq!(m.state(), MachineState::Error);
        assert!(m.snapshot().error.is_some());

        m.dispatch(submit("new prompt"));
        assert_eq!(m.state(), MachineState::Sending);
        assert!(m.snapshot().is_empty());
        assert_eq!(m.snapshot().text, "");
        assert!(m.snapshot().tools.is_empty());
        assert!(m.snapshot().error.is_none());
        assert_eq!(m.request_id(), None);
    }

    #[test]
    fn session_survives_submit_but_not_reset() {
        let mut m = StreamMachine::new();
        m.dispatch(Action::Submit {
            prompt: "a".into(),
            session_id: Some(SessionId::new("s1")),
        });
        m.dispatch(text("x"));
        m.dispatch(complete());

        m.dispatch(submit("b"));
        assert_eq!(m.session_id(), Some(&SessionId::new("s1")));
        m.dispatch(fail("E"));

        m.dispatch(Action::Submit {
            prompt: "c".into(),
            session_id: Some(SessionId::new("s2")),
        });
        assert_eq!(m.session_id(), Some(&SessionId::new("s2")));
        m.dispatch(fail("E"));

        m.dispatch(Action::Reset);
        assert_eq!(m.state(), MachineState::Idle);
        assert_eq!(m.session_id(), None);
        assert_eq!(m.request_id(), None);
        assert!(m.snapshot().is_empty());
    }

    #[test]
    fn first_acknowledgement_wins() {
        let mut m = machine_in(MachineState::Sending);
        assert!(m.dispatch(Action::RequestAcknowledged(RequestId::new("req-1"))).applied);
        assert!(!m.dispatch(Action::RequestAcknowledged(RequestId::new("req-1"))).applied);
        assert!(!m.dispatch(Action::RequestAcknowledged(RequestId::new("req-2"))).applied);
        assert_eq!(m.request_id(), Some(&RequestId::new("req-1")));
    }

    #[test]
    fn acknowledgement_after_first_content_is_still_recorded() {
        let mut m = machine_in(MachineState::Streaming);
        assert!(m.request_id().is_none());
        m.dispatch(Action::RequestAcknowledged(RequestId::new("req-1")));
        assert_eq!(m.request_id(), Some(&RequestId::new("req-1")));
        assert_eq!(m.state(), MachineState::Streaming);
    }

    #[test]
    fn empty_first_chunk_still_starts_streaming() {
        let mut m = machine_in(MachineState::Sending);
        let t = m.dispatch(text(""));
        assert!(t.state_changed());
        assert_eq!(m.state(), MachineState::Streaming);
        assert!(m.snapshot().text.is_empty());
    }

    #[test]
    fn payload_converts_into_action() {
        let action: Action = EventPayload::SessionError {
            code: "RATE_LIMIT".into(),
            message: "slow down".into(),
            recoverable: true,
        }
        .into();
        assert_eq!(action, Action::Fail(ErrorInfo::new("RATE_LIMIT", "slow down", true)));
    }
}
