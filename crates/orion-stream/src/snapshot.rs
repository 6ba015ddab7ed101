use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::ErrorInfo;
use crate::ids::ToolId;

/// Lifecycle of one tool invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolState {
    Running,
    Complete,
    Error,
}

impl ToolState {
    pub fn is_finished(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Input keys that usually identify what a tool is working on, in priority order.
const SUMMARY_KEYS: [&str; 6] = ["file_path", "path", "pattern", "command", "url", "query"];

/// One tool invocation observed for the active request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStatus {
    pub name: String,
    pub input: serde_json::Map<String, serde_json::Value>,
    pub status: ToolState,
    /// Set only once `status` leaves `Running`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ToolStatus {
    pub fn running(
        name: impl Into<String>,
        input: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            input,
            status: ToolState::Running,
            duration_ms: None,
            result: None,
        }
    }

    /// Short display hint for a tool chip, e.g. the file a `Read` targets.
    ///
    /// Falls back to the tool name when no well-known input key is present.
    pub fn summary(&self) -> String {
        SUMMARY_KEYS
            .iter()
            .find_map(|key| {
                self.input
                    .get(*key)
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.trim().is_empty())
            })
            .map(|hint| {
                let hint = hint.lines().next().unwrap_or(hint);
                format!("{}: {}", self.name, hint)
            })
            .unwrap_or_else(|| self.name.clone())
    }
}

/// Totals reported by the backend on successful completion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub duration_ms: u64,
}

/// Everything observed so far for the active request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSnapshot {
    pub text: String,
    pub thinking: String,
    pub tools: IndexMap<ToolId, ToolStatus>,
    pub completion: Option<Completion>,
    pub error: Option<ErrorInfo>,
}

impl StreamSnapshot {
    /// True when nothing has been accumulated (the post-reset shape).
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.thinking.is_empty()
            && self.tools.is_empty()
            && self.completion.is_none()
            && self.error.is_none()
    }

    pub fn tool(&self, tool_id: &str) -> Option<&ToolStatus> {
        self.tools.get(&ToolId::new(tool_id))
    }

    /// Tools still in flight, in the order they started.
    pub fn running_tools(&self) -> impl Iterator<Item = (&ToolId, &ToolStatus)> {
        self.tools
            .iter()
            .filter(|(_, tool)| tool.status == ToolState::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn summary_prefers_file_path() {
        let tool = ToolStatus::running(
            "Read",
            input(&[("path", json!("/b")), ("file_path", json!("/a.txt"))]),
        );
        assert_eq!(tool.summary(), "Read: /a.txt");
    }

    #[test]
    fn summary_uses_first_line_of_command() {
        let tool = ToolStatus::running("Bash", input(&[("command", json!("ls -la\necho done"))]));
        assert_eq!(tool.summary(), "Bash: ls -la");
    }

    #[test]
    fn summary_falls_back_to_name() {
        let tool = ToolStatus::running("Think", input(&[("depth", json!(3))]));
        assert_eq!(tool.summary(), "Think");
    }

    #[test]
    fn default_snapshot_is_empty() {
        let snapshot = StreamSnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.running_tools().count(), 0);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let snapshot = StreamSnapshot {
            completion: Some(Completion {
                total_tokens: 42,
                cost_usd: 0.002,
                duration_ms: 850,
            }),
            ..StreamSnapshot::default()
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["completion"]["totalTokens"], 42);
        assert_eq!(value["completion"]["durationMs"], 850);
        assert!(value["error"].is_null());
    }
}
