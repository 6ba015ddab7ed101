//! Scenario: plain text answer streamed in two chunks.

use std::sync::Arc;

use anyhow::{Result, ensure};
use orion_stream::{CoordinatorConfig, InboundEvent, StreamView, SubmitOutcome};

use super::{push_all, settle, start};
use crate::scripted::ScriptedSubmitter;

pub async fn run(config: CoordinatorConfig) -> Result<StreamView> {
    let handle = start(config, Arc::new(ScriptedSubmitter::acking("req-1")))?;
    let outcome = handle.submit("hello", None).await?;
    ensure!(
        matches!(outcome, SubmitOutcome::Accepted(_)),
        "submit was not accepted: {outcome:?}"
    );

    push_all(
        &handle,
        vec![
            InboundEvent::text("req-1", "Hi"),
            InboundEvent::text("req-1", " there"),
            InboundEvent::complete("req-1", 12, 0.0004, 800),
        ],
    )
    .await?;
    let view = settle(&handle).await?;
    ensure!(view.is_complete, "expected complete, got {}", view.state);
    ensure!(view.snapshot.text == "Hi there", "unexpected text {:?}", view.snapshot.text);
    handle.shutdown().await?;
    Ok(view)
}
