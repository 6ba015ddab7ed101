use crate::config::ConfigError;

/// Error code recorded when the submission call itself fails and no request
/// id was ever obtained.
pub const SEND_FAILED: &str = "SEND_FAILED";

/// Errors returned by a [`Submitter`](crate::submit::Submitter) before a
/// request id is known.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// Network or IPC failure while handing the prompt to the backend.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Backend refused the submission (auth, validation, overload, etc.).
    #[error("submission rejected: {message}")]
    Rejected {
        message: String,
        status_code: Option<u16>,
    },
    /// Backend answered with something that is not a usable acknowledgement.
    #[error("protocol error: {message}")]
    Protocol { message: String },
}

impl SubmitError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Rejected {
            message: message.into(),
            status_code,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Transport { message }
            | Self::Rejected { message, .. }
            | Self::Protocol { message } => message,
        }
    }
}

/// User-visible failure record stored in the snapshot while in `error`.
///
/// The core only carries the data needed to drive retry/dismiss UI; wording
/// belongs to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub recoverable: bool,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            recoverable,
        }
    }

    /// Synthetic failure for a submission that never obtained a request id.
    /// Always recoverable: the user may simply resubmit.
    pub fn send_failed(err: &SubmitError) -> Self {
        Self::new(SEND_FAILED, err.to_string(), true)
    }
}

/// Top-level error type for the coordinator API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    /// Invalid coordinator configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The coordinator task has stopped and no longer accepts commands.
    #[error("coordinator is closed")]
    Closed,
}
