//! Request correlation: decides whether an inbound event belongs to the
//! active request.
//!
//! The backend may keep delivering events for a request the user already
//! abandoned. Accepting them would leak stale text and tool chips into the
//! current turn, so everything that does not carry the active id is dropped.

use crate::event::InboundEvent;
use crate::ids::RequestId;

/// True iff there is an active request and the event carries exactly its id.
///
/// A missing or blank event id is never accepted.
pub fn should_accept(event_request_id: Option<&RequestId>, active: Option<&RequestId>) -> bool {
    match (event_request_id, active) {
        (Some(event_id), Some(active_id)) => !event_id.is_blank() && event_id == active_id,
        _ => false,
    }
}

/// Convenience form of [`should_accept`] for a decoded event.
pub fn accepts(event: &InboundEvent, active: Option<&RequestId>) -> bool {
    should_accept(Some(&event.request_id), active)
}
