//! Scenario: one tool call followed by the answer.

use std::sync::Arc;

use anyhow::{Result, ensure};
use orion_stream::{CoordinatorConfig, InboundEvent, StreamView, ToolState};
use serde_json::json;

use super::{push_all, settle, start};
use crate::scripted::ScriptedSubmitter;

pub async fn run(config: CoordinatorConfig) -> Result<StreamView> {
    let handle = start(config, Arc::new(ScriptedSubmitter::acking("req-2")))?;
    handle.submit("read a.txt", None).await?;

    let mut input = serde_json::Map::new();
    input.insert("file_path".into(), json!("/a.txt"));
    push_all(
        &handle,
        vec![
            InboundEvent::thinking("req-2", "The user wants the file contents."),
            InboundEvent::tool_start("req-2", "t1", "Read", input),
        ],
    )
    .await?;
    let running = handle
        .wait_until(|v| v.snapshot.tool("t1").is_some())
        .await?;
    ensure!(
        running.snapshot.running_tools().count() == 1,
        "tool t1 should be running"
    );

    push_all(
        &handle,
        vec![
            InboundEvent::tool_complete("req-2", "t1", false, 120),
            InboundEvent::text("req-2", "The file says hi."),
            InboundEvent::complete("req-2", 40, 0.0012, 1500),
        ],
    )
    .await?;
    let view = settle(&handle).await?;
    let tool = view.snapshot.tool("t1");
    ensure!(
        tool.is_some_and(|t| t.status == ToolState::Complete && t.duration_ms == Some(120)),
        "tool t1 did not complete: {tool:?}"
    );
    handle.shutdown().await?;
    Ok(view)
}
