use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The argument a tool is invoked with: either one free-text string
/// (ReAct-style `Action Input:`) or a keyed set of values (a JSON object
/// from a structured action block).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolInput {
    Text(String),
    Keyed(Map<String, Value>),
}

impl ToolInput {
    /// Plain-text view.  Keyed input renders as compact JSON.
    pub fn as_text(&self) -> String {
        match self {
            ToolInput::Text(t) => t.clone(),
            ToolInput::Keyed(map) => Value::Object(map.clone()).to_string(),
        }
    }

    /// Look up one keyed argument.  A text input answers only for `key`
    /// equal to `fallback_key`, so single-argument tools accept both forms.
    pub fn get_str<'a>(&'a self, key: &str, fallback_key: &str) -> Option<&'a str> {
        match self {
            ToolInput::Text(t) if key == fallback_key => Some(t.as_str()),
            ToolInput::Text(_) => None,
            ToolInput::Keyed(map) => map.get(key).and_then(Value::as_str),
        }
    }
}

impl fmt::Display for ToolInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for ToolInput {
    fn from(s: &str) -> Self {
        ToolInput::Text(s.to_string())
    }
}

impl From<String> for ToolInput {
    fn from(s: String) -> Self {
        ToolInput::Text(s)
    }
}

/// Failure of a tool's own operation.  The executor never treats this as
/// fatal: the rendered message becomes the observation for that step.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{tool} failed: {message}")]
    Execution { tool: String, message: String },
    #[error("{tool} rejected its input: {message}")]
    InvalidInput { tool: String, message: String },
    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },
}

impl ToolError {
    pub fn execution(tool: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Execution { tool: tool.into(), message: message.to_string() }
    }

    pub fn invalid_input(tool: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::InvalidInput { tool: tool.into(), message: message.to_string() }
    }

    /// Name of the tool that failed.
    pub fn tool_name(&self) -> &str {
        match self {
            ToolError::Execution { tool, .. }
            | ToolError::InvalidInput { tool, .. }
            | ToolError::Timeout { tool, .. } => tool,
        }
    }
}

/// Trait that every built-in and user-defined tool must implement.
///
/// Tools are stateless from the executor's point of view; anything they keep
/// (connections, caches) is their own business, behind `&self`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    /// Shown to the model in the prompt; never consulted by control flow.
    fn description(&self) -> &str;
    /// When true, the tool's output is the run's final answer and the model
    /// is not consulted again.
    fn return_direct(&self) -> bool {
        false
    }
    async fn run(&self, input: &ToolInput) -> Result<String, ToolError>;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn keyed(v: Value) -> ToolInput {
        match v {
            Value::Object(m) => ToolInput::Keyed(m),
            _ => unreachable!(),
        }
    }

    #[test]
    fn text_input_renders_verbatim() {
        assert_eq!(ToolInput::from("capital of France").as_text(), "capital of France");
    }

    #[test]
    fn keyed_input_renders_as_json() {
        let input = keyed(json!({"query": "x"}));
        assert_eq!(input.as_text(), r#"{"query":"x"}"#);
    }

    #[test]
    fn get_str_on_text_uses_fallback_key_only() {
        let input = ToolInput::from("ls");
        assert_eq!(input.get_str("command", "command"), Some("ls"));
        assert_eq!(input.get_str("workdir", "command"), None);
    }

    #[test]
    fn get_str_on_keyed_reads_field() {
        let input = keyed(json!({"command": "ls", "n": 3}));
        assert_eq!(input.get_str("command", "command"), Some("ls"));
        assert_eq!(input.get_str("n", "command"), None);
    }

    #[test]
    fn untagged_deserialization_picks_variant() {
        let t: ToolInput = serde_json::from_value(json!("plain")).unwrap();
        assert_eq!(t, ToolInput::Text("plain".into()));
        let k: ToolInput = serde_json::from_value(json!({"a": 1})).unwrap();
        assert!(matches!(k, ToolInput::Keyed(_)));
    }

    #[test]
    fn tool_error_message_names_the_tool() {
        let e = ToolError::execution("sql", "syntax error near FROM");
        assert_eq!(e.to_string(), "sql failed: syntax error near FROM");
        assert_eq!(e.tool_name(), "sql");
    }
}
