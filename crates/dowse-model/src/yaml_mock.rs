// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// YAML-configured mock model provider for end-to-end runs of the CLI.
///
/// The provider reads a YAML file that maps prompt patterns to a sequence
/// of canned completions.  Each time a rule matches, the next completion in
/// its `replies` list is returned; the last one repeats once the list is
/// exhausted.  This lets a whole plan/act/observe run be scripted in
/// readable YAML.
///
/// # YAML format
///
/// ```yaml
/// responses:
///   - match_type: contains       # contains | equals | starts_with | regex | default
///     pattern: "capital of France"
///     replies:
///       - "Thought: I should look it up.\nAction: search\nAction Input: capital of France"
///       - "Thought: I know it now.\nFinal Answer: Paris"
///
///   - match_type: default
///     replies:
///       - "Final Answer: I don't know."
/// ```
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{truncate_at_stop, Completion, CompletionRequest, Role};

// ─── YAML schema ─────────────────────────────────────────────────────────────

/// Root document.
#[derive(Debug, Deserialize)]
pub struct MockConfig {
    pub responses: Vec<ResponseRule>,
}

/// One entry in the responses list.
#[derive(Debug, Deserialize)]
pub struct ResponseRule {
    /// How to match the user-visible prompt text.
    pub match_type: MatchType,
    /// Pattern string (ignored for `default` match type).
    #[serde(default)]
    pub pattern: String,
    /// Completions returned on successive matches.
    #[serde(default)]
    pub replies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Contains,
    Equals,
    StartsWith,
    Regex,
    Default,
}

// ─── Provider ────────────────────────────────────────────────────────────────

/// A model provider whose responses are driven by a YAML configuration file.
pub struct YamlMockProvider {
    config: Arc<MockConfig>,
    /// How many times each rule (by index) has fired.
    hits: Arc<Mutex<HashMap<usize, usize>>>,
    name: String,
}

impl YamlMockProvider {
    /// Load a provider from a YAML file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading mock responses file: {}", path.display()))?;
        Self::load(&text)
    }

    /// Load a provider from a YAML string.
    pub fn load(yaml: &str) -> anyhow::Result<Self> {
        let config: MockConfig = serde_yaml::from_str(yaml)
            .context("parsing mock responses YAML")?;
        Ok(Self {
            config: Arc::new(config),
            hits: Arc::new(Mutex::new(HashMap::new())),
            name: "yaml-mock".into(),
        })
    }

    fn find_rule(&self, prompt: &str) -> Option<(usize, &ResponseRule)> {
        let lower = prompt.to_lowercase();
        let mut default_rule = None;

        for (idx, rule) in self.config.responses.iter().enumerate() {
            let pattern = rule.pattern.to_lowercase();
            let matched = match rule.match_type {
                MatchType::Default => {
                    default_rule.get_or_insert((idx, rule));
                    false
                }
                MatchType::Contains => lower.contains(&pattern),
                MatchType::Equals => lower.trim() == pattern.trim(),
                MatchType::StartsWith => lower.starts_with(&pattern),
                MatchType::Regex => regex::Regex::new(&rule.pattern)
                    .map(|re| re.is_match(prompt))
                    .unwrap_or(false),
            };
            if matched {
                return Some((idx, rule));
            }
        }

        default_rule
    }
}

#[async_trait]
impl crate::ModelProvider for YamlMockProvider {
    fn name(&self) -> &str { &self.name }
    fn model_name(&self) -> &str { "yaml-mock-model" }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Completion> {
        // Match against the first user turn: for a running agent that is
        // the rendered prompt holding the original request.
        let prompt = req
            .messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let Some((idx, rule)) = self.find_rule(prompt) else {
            return Ok(Completion::text("[no mock rule matched]"));
        };

        let nth = {
            let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
            let n = hits.entry(idx).or_insert(0);
            *n += 1;
            *n - 1
        };
        debug!(rule = idx, nth, "yaml mock complete()");

        let reply = rule
            .replies
            .get(nth)
            .or_else(|| rule.replies.last())
            .map(String::as_str)
            .unwrap_or("[no reply configured]");
        Ok(Completion::text(truncate_at_stop(reply, &req.stop)))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Message, ModelProvider};

    const BASIC_YAML: &str = r#"
responses:
  - match_type: equals
    pattern: "ping"
    replies: ["pong"]

  - match_type: contains
    pattern: "capital"
    replies:
      - "Action: search\nAction Input: capital of France"
      - "Final Answer: Paris"

  - match_type: regex
    pattern: "^\\d+ \\+ \\d+$"
    replies: ["Final Answer: math"]

  - match_type: default
    replies: ["fallback"]
"#;

    fn req(text: &str) -> CompletionRequest {
        CompletionRequest { messages: vec![Message::user(text)], ..Default::default() }
    }

    async fn ask(p: &YamlMockProvider, text: &str) -> String {
        p.complete(req(text)).await.unwrap().text
    }

    #[tokio::test]
    async fn equals_match() {
        let p = YamlMockProvider::load(BASIC_YAML).unwrap();
        assert_eq!(ask(&p, "ping").await, "pong");
    }

    #[tokio::test]
    async fn replies_advance_per_match_and_last_repeats() {
        let p = YamlMockProvider::load(BASIC_YAML).unwrap();
        assert!(ask(&p, "What is the capital of France?").await.starts_with("Action: search"));
        assert_eq!(ask(&p, "What is the capital of France?").await, "Final Answer: Paris");
        assert_eq!(ask(&p, "What is the capital of France?").await, "Final Answer: Paris");
    }

    #[tokio::test]
    async fn regex_match() {
        let p = YamlMockProvider::load(BASIC_YAML).unwrap();
        assert_eq!(ask(&p, "2 + 2").await, "Final Answer: math");
    }

    #[tokio::test]
    async fn default_rule_used_when_nothing_matches() {
        let p = YamlMockProvider::load(BASIC_YAML).unwrap();
        assert_eq!(ask(&p, "something else").await, "fallback");
    }

    #[tokio::test]
    async fn no_rule_and_no_default() {
        let p = YamlMockProvider::load("responses: []").unwrap();
        assert!(ask(&p, "x").await.contains("no mock rule"));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(YamlMockProvider::load("responses: [").is_err());
    }
}
