//! Canned end-to-end runs of the coordinator against a scripted backend.

pub mod backend_error;
pub mod basic_chat;
pub mod retry_after_error;
pub mod stale_events;
pub mod tool_use;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use orion_stream::{
    CoordinatorConfig, CoordinatorHandle, InboundEvent, StreamView, Submitter, spawn_coordinator,
};

use crate::render::render;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs every scenario and prints its final view.
pub async fn run_all(config: &CoordinatorConfig) -> Result<()> {
    let runs = [
        ("basic_chat", basic_chat::run(config.clone()).await?),
        ("tool_use", tool_use::run(config.clone()).await?),
        ("stale_events", stale_events::run(config.clone()).await?),
        ("backend_error", backend_error::run(config.clone()).await?),
        ("retry_after_error", retry_after_error::run(config.clone()).await?),
    ];
    for (name, view) in runs {
        println!("=== Scenario: {name} ===\n{}\n", render(&view));
    }
    Ok(())
}

pub(crate) fn start<S: Submitter + 'static>(
    config: CoordinatorConfig,
    submitter: Arc<S>,
) -> Result<CoordinatorHandle> {
    let (handle, _task) = spawn_coordinator(config, submitter)?;
    Ok(handle)
}

pub(crate) async fn push_all(handle: &CoordinatorHandle, events: Vec<InboundEvent>) -> Result<()> {
    for event in events {
        handle.push_event(event).await?;
    }
    Ok(())
}

/// Waits for `complete` or `error`.
pub(crate) async fn settle(handle: &CoordinatorHandle) -> Result<StreamView> {
    let view = tokio::time::timeout(
        SETTLE_TIMEOUT,
        handle.wait_until(|v| v.state.is_terminal()),
    )
    .await
    .context("request did not finish in time")??;
    Ok(view)
}
