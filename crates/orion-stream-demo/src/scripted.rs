//! Scripted stand-in for the backend submission call.

use std::collections::VecDeque;
use std::sync::Mutex;

use orion_stream::{RequestId, SessionId, SubmitAck, SubmitError, Submitter};

/// Replies from a queue, then acknowledges every further call with `fallback`.
pub struct ScriptedSubmitter {
    replies: Mutex<VecDeque<Result<SubmitAck, SubmitError>>>,
    fallback: RequestId,
    prompts: Mutex<Vec<(String, Option<SessionId>)>>,
}

impl ScriptedSubmitter {
    pub fn acking(request_id: impl Into<RequestId>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: request_id.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queues a reply ahead of the fallback acknowledgement.
    pub fn then(self, reply: Result<SubmitAck, SubmitError>) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<(String, Option<SessionId>)> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl Submitter for ScriptedSubmitter {
    async fn submit(
        &self,
        prompt: &str,
        session_id: Option<&SessionId>,
    ) -> Result<SubmitAck, SubmitError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((prompt.to_string(), session_id.cloned()));
        let queued = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        queued.unwrap_or_else(|| Ok(SubmitAck::new(self.fallback.clone())))
    }
}
