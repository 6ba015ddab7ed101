use std::fmt::Write as _;

use orion_stream::{StreamView, ToolState};

/// One-line text rendering of a published view.
pub fn render(view: &StreamView) -> String {
    let mut out = format!("[{}]", view.state);
    if let Some(id) = &view.request_id {
        let _ = write!(out, " request={id}");
    }
    let snapshot = &view.snapshot;
    if view.shows_thinking_indicator() {
        out.push_str(" (thinking...)");
    } else if !snapshot.thinking.is_empty() {
        let _ = write!(out, " thinking={}B", snapshot.thinking.len());
    }
    if !snapshot.text.is_empty() {
        let _ = write!(out, " text={:?}", snapshot.text);
    }
    for tool in snapshot.tools.values() {
        let status = match tool.status {
            ToolState::Running => "running".to_string(),
            ToolState::Complete => format!("ok {}ms", tool.duration_ms.unwrap_or_default()),
            ToolState::Error => format!("failed {}ms", tool.duration_ms.unwrap_or_default()),
        };
        let _ = write!(out, " tool=<{} {status}>", tool.summary());
    }
    if let Some(done) = &snapshot.completion {
        let _ = write!(
            out,
            " tokens={} cost=${:.4} took={}ms",
            done.total_tokens, done.cost_usd, done.duration_ms
        );
    }
    if let Some(err) = &snapshot.error {
        let retry = if err.recoverable { " (retryable)" } else { "" };
        let _ = write!(out, " error={}: {}{retry}", err.code, err.message);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_stream::{Action, ContentKind, StreamMachine};

    #[test]
    fn renders_streaming_text_and_tools() {
        let mut machine = StreamMachine::new();
        machine.dispatch(Action::Submit {
            prompt: "hi".into(),
            session_id: None,
        });
        machine.dispatch(Action::RequestAcknowledged("req-1".into()));
        let mut input = serde_json::Map::new();
        input.insert("file_path".into(), serde_json::json!("/a.txt"));
        machine.dispatch(Action::ToolStart {
            tool_id: "t1".into(),
            name: "Read".into(),
            input,
        });
        machine.dispatch(Action::TextChunk {
            kind: ContentKind::Text,
            content: "Hi".into(),
        });

        let line = render(&StreamView::from_machine(&machine));
        assert_eq!(
            line,
            "[streaming] request=req-1 text=\"Hi\" tool=<Read: /a.txt running>"
        );
    }

    #[test]
    fn renders_thinking_indicator() {
        let mut machine = StreamMachine::new();
        machine.dispatch(Action::Submit {
            prompt: "hi".into(),
            session_id: None,
        });
        machine.dispatch(Action::TextChunk {
            kind: ContentKind::Thinking,
            content: "hmm".into(),
        });
        assert_eq!(
            render(&StreamView::from_machine(&machine)),
            "[streaming] (thinking...)"
        );
    }
}
