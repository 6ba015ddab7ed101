use crate::errors::SubmitError;
use crate::ids::{RequestId, SessionId};

/// Backend acknowledgement of a submitted prompt.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAck {
    pub request_id: RequestId,
}

impl SubmitAck {
    pub fn new(request_id: impl Into<RequestId>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }
}

/// Outbound submission contract: hands a prompt to the backend and returns
/// the request id its events will carry.
///
/// Injected into the coordinator so the core never depends on a particular
/// IPC or HTTP transport.
#[async_trait::async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(
        &self,
        prompt: &str,
        session_id: Option<&SessionId>,
    ) -> Result<SubmitAck, SubmitError>;
}

/// Result of asking the coordinator to submit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Backend acknowledged; events with this id will be applied.
    Accepted(RequestId),
    /// A request is already in flight; the submit was dropped.
    Ignored,
    /// The submission call failed and the machine is now in `error`.
    Failed(crate::errors::ErrorInfo),
}

impl SubmitOutcome {
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::Accepted(id) => Some(id),
            _ => None,
        }
    }
}
