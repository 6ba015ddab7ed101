//! Inbound event contract delivered by the backend for a request.

use serde::{Deserialize, Serialize};

use crate::ids::{RequestId, SessionId, ToolId};

/// Which snapshot buffer a chunk appends to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Thinking,
}

/// One event as emitted by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub request_id: RequestId,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// ISO-8601 emission time. Informational only; ordering comes from
    /// delivery order.
    #[serde(default)]
    pub timestamp: String,
    pub payload: EventPayload,
}

impl InboundEvent {
    pub fn new(request_id: impl Into<RequestId>, payload: EventPayload) -> Self {
        Self {
            request_id: request_id.into(),
            session_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            payload,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Parsed emission time, if the backend sent a valid RFC 3339 stamp.
    pub fn emitted_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|ts| ts.with_timezone(&chrono::Utc))
    }

    pub fn text(request_id: impl Into<RequestId>, content: impl Into<String>) -> Self {
        Self::new(
            request_id,
            EventPayload::TextChunk {
                content_type: ContentKind::Text,
                content: content.into(),
            },
        )
    }

    pub fn thinking(request_id: impl Into<RequestId>, content: impl Into<String>) -> Self {
        Self::new(
            request_id,
            EventPayload::TextChunk {
                content_type: ContentKind::Thinking,
                content: content.into(),
            },
        )
    }

    pub fn tool_start(
        request_id: impl Into<RequestId>,
        tool_id: impl Into<ToolId>,
        tool_name: impl Into<String>,
        input: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self::new(
            request_id,
            EventPayload::ToolStart {
                tool_id: tool_id.into(),
                tool_name: tool_name.into(),
                input,
            },
        )
    }

    pub fn tool_complete(
        request_id: impl Into<RequestId>,
        tool_id: impl Into<ToolId>,
        is_error: bool,
        duration_ms: u64,
    ) -> Self {
        Self::new(
            request_id,
            EventPayload::ToolComplete {
                tool_id: tool_id.into(),
                result: serde_json::Value::Null,
                is_error,
                duration_ms,
            },
        )
    }

    pub fn complete(
        request_id: impl Into<RequestId>,
        total_tokens: u64,
        cost_usd: f64,
        duration_ms: u64,
    ) -> Self {
        Self::new(
            request_id,
            EventPayload::SessionComplete {
                total_tokens,
                cost_usd,
                duration_ms,
            },
        )
    }

    pub fn error(
        request_id: impl Into<RequestId>,
        code: impl Into<String>,
        message: impl Into<String>,
        recoverable: bool,
    ) -> Self {
        Self::new(
            request_id,
            EventPayload::SessionError {
                code: code.into(),
                message: message.into(),
                recoverable,
            },
        )
    }
}

/// Closed set of payloads, tagged by `kind` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    #[serde(rename_all = "camelCase")]
    TextChunk {
        content_type: ContentKind,
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolStart {
        tool_id: ToolId,
        tool_name: String,
        #[serde(default)]
        input: serde_json::Map<String, serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    ToolComplete {
        tool_id: ToolId,
        #[serde(default)]
        result: serde_json::Value,
        is_error: bool,
        duration_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    SessionComplete {
        total_tokens: u64,
        cost_usd: f64,
        duration_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    SessionError {
        code: String,
        message: String,
        recoverable: bool,
    },
}

impl EventPayload {
    /// Short tag used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextChunk { .. } => "text_chunk",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolComplete { .. } => "tool_complete",
            Self::SessionComplete { .. } => "session_complete",
            Self::SessionError { .. } => "session_error",
        }
    }

    /// True for text/thinking deltas, the only payloads eligible for coalescing.
    pub fn is_chunk(&self) -> bool {
        matches!(self, Self::TextChunk { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_start_serializes_with_camel_case_fields() {
        let mut input = serde_json::Map::new();
        input.insert("file_path".into(), json!("/a.txt"));
        let event = InboundEvent::tool_start("req-1", "t1", "Read", input).with_session("s1");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["requestId"], "req-1");
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["payload"]["kind"], "tool_start");
        assert_eq!(value["payload"]["toolId"], "t1");
        assert_eq!(value["payload"]["toolName"], "Read");
        assert_eq!(value["payload"]["input"]["file_path"], "/a.txt");
    }

    #[test]
    fn text_chunk_deserializes_from_wire_shape() {
        let event: InboundEvent = serde_json::from_value(json!({
            "requestId": "req-1",
            "sessionId": "sess-9",
            "timestamp": "2026-01-27T12:00:00Z",
            "payload": {"kind": "text_chunk", "contentType": "thinking", "content": "hmm"}
        }))
        .unwrap();
        assert_eq!(
            event.payload,
            EventPayload::TextChunk {
                content_type: ContentKind::Thinking,
                content: "hmm".into()
            }
        );
        assert!(event.emitted_at().is_some());
        assert!(event.payload.is_chunk());
    }

    #[test]
    fn tool_complete_result_defaults_to_null() {
        let payload: EventPayload = serde_json::from_value(json!({
            "kind": "tool_complete", "toolId": "t1", "isError": false, "durationMs": 120
        }))
        .unwrap();
        assert!(matches!(
            payload,
            EventPayload::ToolComplete { result: serde_json::Value::Null, duration_ms: 120, .. }
        ));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result: Result<EventPayload, _> =
            serde_json::from_value(json!({"kind": "heartbeat"}));
        assert!(result.is_err());
    }
}
