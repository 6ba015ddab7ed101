//! Scenario: the first submission fails, the retry succeeds.

use std::sync::Arc;

use anyhow::{Result, ensure};
use orion_stream::{
    CoordinatorConfig, InboundEvent, SEND_FAILED, SessionId, StreamView, SubmitError,
    SubmitOutcome,
};

use super::{push_all, settle, start};
use crate::scripted::ScriptedSubmitter;

const SESSION: &str = "orion-daily-2026-01-27";

pub async fn run(config: CoordinatorConfig) -> Result<StreamView> {
    let submitter = Arc::new(
        ScriptedSubmitter::acking("req-3")
            .then(Err(SubmitError::transport("backend unreachable"))),
    );
    let handle = start(config, Arc::clone(&submitter))?;

    let first = handle
        .submit("hello", Some(SessionId::new(SESSION)))
        .await?;
    let failed = match &first {
        SubmitOutcome::Failed(info) => info.code == SEND_FAILED,
        _ => false,
    };
    ensure!(failed, "first submit should fail with {SEND_FAILED}: {first:?}");
    ensure!(handle.view().is_error, "expected error view after failed submit");

    let retry = handle.submit("hello", None).await?;
    ensure!(
        matches!(retry, SubmitOutcome::Accepted(_)),
        "retry was not accepted: {retry:?}"
    );
    push_all(
        &handle,
        vec![
            InboundEvent::text("req-3", "ok"),
            InboundEvent::complete("req-3", 3, 0.0, 100),
        ],
    )
    .await?;
    let view = settle(&handle).await?;
    handle.shutdown().await?;

    // The retry omits the session; the coordinator must resend the one it kept.
    let prompts = submitter.prompts();
    ensure!(prompts.len() == 2, "expected two submissions, saw {prompts:?}");
    ensure!(
        prompts[1].1.as_ref().map(SessionId::as_str) == Some(SESSION),
        "retry did not carry the session: {prompts:?}"
    );
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn retry_clears_previous_error_and_keeps_session() {
        let view = run(CoordinatorConfig::default()).await.unwrap();
        assert!(view.is_complete);
        assert!(view.snapshot.error.is_none());
        assert_eq!(view.snapshot.text, "ok");
        assert_eq!(view.session_id, Some(SessionId::new(SESSION)));
    }
}
