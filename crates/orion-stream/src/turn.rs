//! Conversation-turn records handed to an external persistence layer once a
//! request completes. The core never stores them itself.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ids::SessionId;
use crate::machine::{MachineState, StreamMachine};

const MAX_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnValidationError {
    #[error("Conversation ID cannot be empty")]
    EmptyConversationId,
    #[error("Message ID cannot be empty")]
    EmptyId,
    #[error("Message ID too long (max {MAX_ID_LEN} bytes)")]
    IdTooLong,
    #[error("Message ID must start with alphanumeric character")]
    IdBadStart,
    #[error("Message ID must end with alphanumeric character")]
    IdBadEnd,
    #[error("Message ID cannot have consecutive special characters")]
    IdConsecutiveSpecials,
    #[error("Message ID contains invalid characters")]
    IdInvalidChars,
    #[error("Timestamp cannot be empty")]
    EmptyTimestamp,
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One stored message. Tool calls/results are pre-serialized JSON strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Option<String>,
    #[serde(default)]
    pub tool_results: Option<String>,
    pub created_at: String,
}

impl TurnMessage {
    pub fn new(role: MessageRole, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            role,
            content: content.into(),
            tool_calls: None,
            tool_results: None,
            created_at: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn validate(&self) -> Result<(), TurnValidationError> {
        validate_id(&self.id)?;
        validate_timestamp(&self.created_at)
    }
}

/// Ids are path-safe tokens: alphanumerics separated by single `-` or `_`.
fn validate_id(id: &str) -> Result<(), TurnValidationError> {
    if id.is_empty() {
        return Err(TurnValidationError::EmptyId);
    }
    if id.len() > MAX_ID_LEN {
        return Err(TurnValidationError::IdTooLong);
    }
    if !id.chars().next().is_some_and(char::is_alphanumeric) {
        return Err(TurnValidationError::IdBadStart);
    }
    if !id.chars().last().is_some_and(char::is_alphanumeric) {
        return Err(TurnValidationError::IdBadEnd);
    }
    let mut prev_special = false;
    for c in id.chars() {
        let special = c == '-' || c == '_';
        if special && prev_special {
            return Err(TurnValidationError::IdConsecutiveSpecials);
        }
        if !special && !c.is_alphanumeric() {
            return Err(TurnValidationError::IdInvalidChars);
        }
        prev_special = special;
    }
    Ok(())
}

fn validate_timestamp(ts: &str) -> Result<(), TurnValidationError> {
    if ts.is_empty() {
        return Err(TurnValidationError::EmptyTimestamp);
    }
    if DateTime::parse_from_rfc3339(ts).is_ok() {
        return Ok(());
    }
    chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|_| ())
        .map_err(|e| TurnValidationError::InvalidTimestamp(e.to_string()))
}

/// User prompt plus assistant answer for one completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub conversation_id: String,
    pub user_message: TurnMessage,
    pub assistant_message: TurnMessage,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

impl ConversationTurn {
    /// Builds the turn for a machine in `complete`; `None` in any other state.
    ///
    /// The user message is stamped at `now` minus the reported request
    /// duration so the pair sorts correctly.
    pub fn from_machine(
        machine: &StreamMachine,
        conversation_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Option<Result<Self, TurnValidationError>> {
        if machine.state() != MachineState::Complete {
            return None;
        }
        let prompt = machine.prompt()?;
        let snapshot = machine.snapshot();
        let elapsed_ms = snapshot
            .completion
            .as_ref()
            .map_or(0, |c| i64::try_from(c.duration_ms).unwrap_or(i64::MAX));
        let asked_at = now
            .checked_sub_signed(chrono::Duration::milliseconds(elapsed_ms))
            .unwrap_or(now);

        let mut assistant = TurnMessage::new(MessageRole::Assistant, snapshot.text.clone(), now);
        if !snapshot.tools.is_empty() {
            let calls: Vec<_> = snapshot
                .tools
                .iter()
                .map(|(id, tool)| json!({ "id": id, "name": tool.name, "input": tool.input }))
                .collect();
            let results: Vec<_> = snapshot
                .tools
                .iter()
                .map(|(id, tool)| {
                    json!({
                        "id": id,
                        "status": tool.status,
                        "durationMs": tool.duration_ms,
                        "result": tool.result,
                    })
                })
                .collect();
            assistant.tool_calls = Some(serde_json::Value::Array(calls).to_string());
            assistant.tool_results = Some(serde_json::Value::Array(results).to_string());
        }

        let turn = Self {
            conversation_id: conversation_id.into(),
            user_message: TurnMessage::new(MessageRole::User, prompt, asked_at),
            assistant_message: assistant,
            session_id: machine.session_id().cloned(),
        };
        Some(turn.validate().map(|()| turn))
    }

    pub fn validate(&self) -> Result<(), TurnValidationError> {
        if self.conversation_id.trim().is_empty() {
            return Err(TurnValidationError::EmptyConversationId);
        }
        self.user_message.validate()?;
        self.assistant_message.validate()
    }
}
