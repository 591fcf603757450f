use serde::{Deserialize, Serialize};

// ─── Message types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in the prompt sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: text.into() }
    }

    /// Rough token estimate (chars / 4), used only for log output.
    pub fn approx_tokens(&self) -> usize {
        self.content.len() / 4 + 1
    }
}

// ─── Request / response ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    /// Sequences at which the provider must stop generating.  The returned
    /// text never contains a stop sequence.
    pub stop: Vec<String>,
    /// Per-request overrides; providers fall back to their configured values.
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// The text of the most recent user message, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A finished (non-streamed) completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<Usage>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), usage: None }
    }
}

/// Cut `text` at the earliest occurrence of any stop sequence.
///
/// Providers are asked to stop server-side, but several OpenAI-compatible
/// servers ignore or cap the `stop` list, so callers apply this again.
pub fn truncate_at_stop<'a>(text: &'a str, stop: &[String]) -> &'a str {
    let cut = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min();
    match cut {
        Some(idx) => &text[..idx],
        None => text,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn stops(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn truncate_cuts_at_earliest_stop() {
        let text = "Action: a\nAction Input: b\nObservation: made up\nThought: more";
        let out = truncate_at_stop(text, &stops(&["\nThought:", "\nObservation:"]));
        assert_eq!(out, "Action: a\nAction Input: b");
    }

    #[test]
    fn truncate_without_match_is_identity() {
        assert_eq!(truncate_at_stop("Final Answer: 4", &stops(&["\nObservation:"])), "Final Answer: 4");
    }

    #[test]
    fn empty_stop_sequences_are_ignored() {
        assert_eq!(truncate_at_stop("abc", &stops(&[""])), "abc");
    }

    #[test]
    fn last_user_text_skips_assistant_turns() {
        let req = CompletionRequest {
            messages: vec![
                Message::system("sys"),
                Message::user("first"),
                Message::assistant("reply"),
                Message::user("second"),
                Message::assistant("pending"),
            ],
            ..Default::default()
        };
        assert_eq!(req.last_user_text(), Some("second"));
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("x")).unwrap();
        assert!(json.contains(r#""role":"assistant""#));
    }
}
