//! Scenario: the backend fails the session part way through.

use std::sync::Arc;

use anyhow::{Result, ensure};
use orion_stream::{CoordinatorConfig, InboundEvent, StreamView};

use super::{push_all, settle, start};
use crate::scripted::ScriptedSubmitter;

pub async fn run(config: CoordinatorConfig) -> Result<StreamView> {
    let handle = start(config, Arc::new(ScriptedSubmitter::acking("req-7")))?;
    handle.submit("summarize my inbox", None).await?;

    push_all(
        &handle,
        vec![
            InboundEvent::text("req-7", "You have"),
            InboundEvent::error("req-7", "RATE_LIMIT", "Too many requests", true),
            InboundEvent::text("req-7", " ignored"),
        ],
    )
    .await?;
    let view = settle(&handle).await?;
    ensure!(view.is_error, "expected error, got {}", view.state);
    handle.shutdown().await?;
    Ok(view)
}
