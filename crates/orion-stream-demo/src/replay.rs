//! Replays a recorded event script through the async coordinator.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::{StreamExt as _, stream};
use orion_stream::wire::decode_stream;
use orion_stream::{
    CoordinatorConfig, InboundEvent, SessionId, StreamView, SubmitError, SubmitOutcome,
    spawn_coordinator,
};
use tracing::{info, warn};

use crate::render::render;
use crate::scripted::ScriptedSubmitter;

/// Bytes handed to the decoder per simulated transport read.
const READ_CHUNK: usize = 64;
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    pub prompt: String,
    pub session_id: Option<SessionId>,
    pub request_id: Option<String>,
    pub fail_submit: bool,
    /// How long to wait for a terminal view after the last event.
    pub settle_timeout: Option<Duration>,
}

pub struct ReplayReport {
    pub outcome: SubmitOutcome,
    /// Rendered views in publication order.
    pub published: Vec<String>,
    pub view: StreamView,
}

pub async fn replay_file(
    path: &Path,
    config: CoordinatorConfig,
    options: ReplayOptions,
) -> Result<ReplayReport> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read event script: {}", path.display()))?;
    let events = decode_script(&bytes).await;
    info!(path = %path.display(), events = events.len(), "loaded event script");
    replay_events(events, config, options).await
}

async fn decode_script(bytes: &[u8]) -> Vec<InboundEvent> {
    decode_stream(stream::iter(bytes.chunks(READ_CHUNK)))
        .collect()
        .await
}

pub async fn replay_events(
    events: Vec<InboundEvent>,
    config: CoordinatorConfig,
    options: ReplayOptions,
) -> Result<ReplayReport> {
    let request_id = match options
        .request_id
        .clone()
        .or_else(|| events.first().map(|e| e.request_id.as_str().to_string()))
    {
        Some(id) => id,
        None => bail!("event script is empty and no --request-id was given"),
    };
    let mut submitter = ScriptedSubmitter::acking(request_id);
    if options.fail_submit {
        submitter = submitter.then(Err(SubmitError::transport("scripted submission failure")));
    }

    let (handle, task) = spawn_coordinator(config, Arc::new(submitter))?;
    let mut views = handle.subscribe();
    let printer = tokio::spawn(async move {
        let mut published = Vec::new();
        while views.changed().await.is_ok() {
            published.push(render(&views.borrow_and_update()));
        }
        published
    });

    let outcome = handle.submit(options.prompt, options.session_id).await?;
    if outcome.request_id().is_some() {
        for event in events {
            handle.push_event(event).await?;
        }
        let settle = options.settle_timeout.unwrap_or(SETTLE_TIMEOUT);
        match tokio::time::timeout(settle, handle.wait_until(|v| v.state.is_terminal())).await {
            Ok(settled) => {
                settled?;
            }
            Err(_) => warn!(
                timeout_ms = settle.as_millis() as u64,
                state = %handle.view().state,
                "event script ended without a terminal event"
            ),
        }
    }

    handle.shutdown().await?;
    task.await.context("coordinator task panicked")?;
    let view = handle.view();
    drop(handle);
    let published = printer.await.context("view printer panicked")?;

    Ok(ReplayReport {
        outcome,
        published,
        view,
    })
}
