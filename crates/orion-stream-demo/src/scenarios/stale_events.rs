//! Scenario: leftovers from an earlier request arrive mid-stream.

use std::sync::Arc;

use anyhow::{Result, ensure};
use orion_stream::{CoordinatorConfig, InboundEvent, StreamView};

use super::{push_all, settle, start};
use crate::scripted::ScriptedSubmitter;

pub async fn run(config: CoordinatorConfig) -> Result<StreamView> {
    let handle = start(config, Arc::new(ScriptedSubmitter::acking("req-1")))?;
    handle.submit("what's new?", None).await?;

    push_all(
        &handle,
        vec![
            InboundEvent::text("req-0", "old answer"),
            InboundEvent::text("req-1", "new answer"),
            InboundEvent::complete("req-0", 99, 1.0, 1),
            InboundEvent::error("req-0", "STALE", "late failure", false),
            InboundEvent::complete("req-1", 5, 0.0001, 300),
        ],
    )
    .await?;
    let view = settle(&handle).await?;
    ensure!(view.snapshot.text == "new answer", "stale text leaked: {:?}", view.snapshot.text);
    handle.shutdown().await?;
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stale_events_are_ignored() {
        let view = run(CoordinatorConfig::default()).await.unwrap();
        assert!(view.is_complete);
        assert!(view.snapshot.error.is_none());
        assert_eq!(view.snapshot.completion.as_ref().unwrap().total_tokens, 5);
    }
}
