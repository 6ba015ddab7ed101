//! Common imports for hosts that drive a coordinator.
pub use crate::{
    ContentKind, CoordinatorConfig, CoordinatorError, CoordinatorHandle, ErrorInfo, EventPayload,
    InboundEvent, MachineState, RequestId, SessionId, StreamCoordinator, StreamSnapshot,
    StreamView, SubmitAck, SubmitError, SubmitOutcome, Submitter, ToolId, ToolState,
    spawn_coordinator,
};
