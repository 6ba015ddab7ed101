//! Client-side coordinator for streamed assistant responses.
//!
//! Backend events are correlated to the active request, folded into an
//! immutable [`StreamSnapshot`], and gated by a small state machine
//! (`idle → sending → streaming → complete | error`). Renderers read a
//! [`StreamView`] and never see partially applied updates.
//!
//! # Async usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use orion_stream::prelude::*;
//!
//! struct Backend;
//!
//! #[async_trait::async_trait]
//! impl Submitter for Backend {
//!     async fn submit(
//!         &self,
//!         _prompt: &str,
//!         _session_id: Option<&SessionId>,
//!     ) -> Result<SubmitAck, SubmitError> {
//!         Ok(SubmitAck::new("req-1"))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), CoordinatorError> {
//! let (handle, _task) = spawn_coordinator(CoordinatorConfig::default(), Arc::new(Backend))?;
//! handle.submit("Say hello", None).await?;
//! handle.push_event(InboundEvent::text("req-1", "Hello")).await?;
//! handle.push_event(InboundEvent::complete("req-1", 12, 0.0004, 800)).await?;
//! let view = handle.wait_until(|v| v.is_complete).await?;
//! println!("{}", view.snapshot.text);
//! # Ok(())
//! # }
//! ```

/// Pure snapshot mutations for each payload kind.
pub mod accumulator;
/// Frame-level batching of text and thinking deltas.
pub mod coalesce;
/// Coordinator configuration.
pub mod config;
/// Synchronous coordination core.
pub mod coordinator;
/// Request-id correlation.
pub mod correlator;
/// Public error types.
pub mod errors;
/// Inbound event envelope and payloads.
pub mod event;
/// Request, session and tool identifiers.
pub mod ids;
/// Streaming state machine.
pub mod machine;
/// Tracing initialization.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Async driver and handle.
pub mod runtime;
/// Accumulated response snapshot.
pub mod snapshot;
/// Submission contract.
pub mod submit;
/// Conversation-turn records for persistence.
pub mod turn;
/// Read-only presentation view.
pub mod view;
/// Newline-delimited JSON event decoding.
pub mod wire;

pub use config::{ConfigError, CoordinatorConfig};
pub use coordinator::{PendingSubmit, Publish, StreamCoordinator};
pub use errors::{CoordinatorError, ErrorInfo, SEND_FAILED, SubmitError};
pub use event::{ContentKind, EventPayload, InboundEvent};
pub use ids::{RequestId, SessionId, ToolId};
pub use machine::{Action, MachineState, StreamMachine, Transition};
pub use observability::init_observability;
pub use runtime::{CoordinatorHandle, spawn_coordinator};
pub use snapshot::{Completion, StreamSnapshot, ToolState, ToolStatus};
pub use submit::{SubmitAck, SubmitOutcome, Submitter};
pub use turn::{ConversationTurn, MessageRole, TurnMessage, TurnValidationError};
pub use view::StreamView;
pub use wire::{DecodeError, LineDecoder, decode_event};
