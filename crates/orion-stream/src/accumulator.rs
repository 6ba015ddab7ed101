//! Snapshot mutations for accepted events.
//!
//! These are the only functions that write to a [`StreamSnapshot`]; the state
//! machine calls them after deciding a transition is legal. Each returns
//! whether the snapshot actually changed so callers can skip publishing.

use crate::errors::ErrorInfo;
use crate::event::ContentKind;
use crate::ids::ToolId;
use crate::snapshot::{Completion, StreamSnapshot, ToolState, ToolStatus};

/// Appends `content` to the text or thinking buffer. No de-duplication.
pub fn apply_text_chunk(snapshot: &mut StreamSnapshot, kind: ContentKind, content: &str) -> bool {
    if content.is_empty() {
        return false;
    }
    match kind {
        ContentKind::Text => snapshot.text.push_str(content),
        ContentKind::Thinking => snapshot.thinking.push_str(content),
    }
    true
}

/// Records a running tool. A repeated start for a running tool overwrites it;
/// a start for a tool that already finished is ignored so a status never
/// reverts to `Running`.
pub fn apply_tool_start(
    snapshot: &mut StreamSnapshot,
    tool_id: ToolId,
    name: String,
    input: serde_json::Map<String, serde_json::Value>,
) -> bool {
    if let Some(existing) = snapshot.tools.get(&tool_id)
        && existing.status.is_finished()
    {
        return false;
    }
    snapshot
        .tools
        .insert(tool_id, ToolStatus::running(name, input));
    true
}

/// Finishes a known running tool. Unknown or already finished ids are ignored.
pub fn apply_tool_complete(
    snapshot: &mut StreamSnapshot,
    tool_id: &ToolId,
    is_error: bool,
    duration_ms: u64,
    result: Option<serde_json::Value>,
) -> bool {
    let Some(tool) = snapshot.tools.get_mut(tool_id) else {
        return false;
    };
    if tool.status.is_finished() {
        return false;
    }
    tool.status = if is_error {
        ToolState::Error
    } else {
        ToolState::Complete
    };
    tool.duration_ms = Some(duration_ms);
    tool.result = result.filter(|value| !value.is_null());
    true
}

pub fn apply_completion(snapshot: &mut StreamSnapshot, completion: Completion) -> bool {
    snapshot.completion = Some(completion);
    true
}

pub fn apply_error(snapshot: &mut StreamSnapshot, error: ErrorInfo) -> bool {
    snapshot.error = Some(error);
    true
}
