use std::sync::Arc;

use serde::Serialize;

use crate::ids::{RequestId, SessionId};
use crate::machine::{MachineState, StreamMachine};
use crate::snapshot::StreamSnapshot;

/// Read-only view handed to the rendering layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamView {
    pub state: MachineState,
    pub snapshot: Arc<StreamSnapshot>,
    pub request_id: Option<RequestId>,
    pub session_id: Option<SessionId>,
    pub is_loading: bool,
    pub is_error: bool,
    pub is_complete: bool,
}

impl StreamView {
    pub fn from_machine(machine: &StreamMachine) -> Self {
        let state = machine.state();
        Self {
            state,
            snapshot: machine.shared_snapshot(),
            request_id: machine.request_id().cloned(),
            session_id: machine.session_id().cloned(),
            is_loading: state.is_busy(),
            is_error: state == MachineState::Error,
            is_complete: state == MachineState::Complete,
        }
    }

    /// Reasoning is arriving but no answer text has been produced yet.
    pub fn shows_thinking_indicator(&self) -> bool {
        self.state == MachineState::Streaming
            && !self.snapshot.thinking.is_empty()
            && self.snapshot.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ContentKind;
    use crate::machine::Action;

    fn chunk(kind: ContentKind, content: &str) -> Action {
        Action::TextChunk {
            kind,
            content: content.into(),
        }
    }

    #[test]
    fn flags_follow_state() {
        let mut machine = StreamMachine::new();
        let view = StreamView::from_machine(&machine);
        assert!(!view.is_loading && !view.is_error && !view.is_complete);

        machine.dispatch(Action::Submit {
            prompt: "hi".into(),
            session_id: None,
        });
        assert!(StreamView::from_machine(&machine).is_loading);

        machine.dispatch(chunk(ContentKind::Text, "x"));
        machine.dispatch(Action::Complete(crate::snapshot::Completion {
            total_tokens: 1,
            cost_usd: 0.0,
            duration_ms: 1,
        }));
        let view = StreamView::from_machine(&machine);
        assert!(view.is_complete);
        assert!(!view.is_loading);
    }

    #[test]
    fn thinking_indicator_clears_once_text_arrives() {
        let mut machine = StreamMachine::new();
        machine.dispatch(Action::Submit {
            prompt: "hi".into(),
            session_id: None,
        });
        machine.dispatch(chunk(ContentKind::Thinking, "considering"));
        assert!(StreamView::from_machine(&machine).shows_thinking_indicator());

        machine.dispatch(chunk(ContentKind::Text, "Answer"));
        assert!(!StreamView::from_machine(&machine).shows_thinking_indicator());
    }

    #[test]
    fn view_keeps_its_snapshot_after_machine_moves_on() {
        let mut machine = StreamMachine::new();
        machine.dispatch(Action::Submit {
            prompt: "hi".into(),
            session_id: None,
        });
        machine.dispatch(chunk(ContentKind::Text, "a"));
        let view = StreamView::from_machine(&machine);
        machine.dispatch(chunk(ContentKind::Text, "b"));
        assert_eq!(view.snapshot.text, "a");
        assert_eq!(machine.snapshot().text, "ab");
    }
}
