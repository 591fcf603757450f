// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

/// Serde default helper returning `true`.
///
/// `#[serde(default)]` on a `bool` always falls back to `false`, so fields
/// that are on unless switched off need a named function.
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider identifier: "openai" | "mock"
    pub provider: String,
    /// Model name forwarded to the provider API
    pub name: String,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files to avoid secrets
    /// in version-controlled files
    pub api_key: Option<String>,
    /// Base URL override for OpenAI-compatible servers (Ollama, vLLM, LiteLLM).
    pub base_url: Option<String>,
    /// Maximum tokens to request in a single completion
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f32>,
    /// Path to a YAML mock-responses file (used when provider = "mock").
    /// Can also be set via the DOWSE_MOCK_RESPONSES environment variable.
    pub mock_responses_file: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            name: "gpt-4o-mini".into(),
            api_key_env: Some("OPENAI_API_KEY".into()),
            api_key: None,
            base_url: None,
            max_tokens: Some(1024),
            // Agents parse structured text out of completions; keep sampling tight.
            temperature: Some(0.0),
            mock_responses_file: None,
        }
    }
}

fn default_max_iterations() -> u32 {
    15
}
fn default_early_stopping_method() -> String {
    "force".into()
}
fn default_max_decision_retries() -> u32 {
    2
}

/// Prompt convention the agent speaks with the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AgentStyleKind {
    /// `Thought:` / `Action:` / `Action Input:` / `Final Answer:` markers in a
    /// single text prompt.
    #[default]
    React,
    /// Chat turns; the model answers with a fenced JSON block holding
    /// `action` and `action_input`.
    Conversational,
}

impl std::fmt::Display for AgentStyleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStyleKind::React => write!(f, "react"),
            AgentStyleKind::Conversational => write!(f, "conversational"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Prompt convention and output grammar
    #[serde(default)]
    pub style: AgentStyleKind,
    /// Maximum number of plan/act iterations before the run is stopped
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Wall-clock budget for one run, in seconds.  Unlimited when unset.
    #[serde(default)]
    pub max_execution_time_secs: Option<f64>,
    /// What to return when a budget is exhausted.  Only `"force"` is
    /// supported; anything else is rejected when the executor is built.
    #[serde(default = "default_early_stopping_method")]
    pub early_stopping_method: String,
    /// How many unparsable completions or failed model calls a single run
    /// tolerates before giving up.
    #[serde(default = "default_max_decision_retries")]
    pub max_decision_retries: u32,
    /// Show the model its own unparsable output together with a reminder of
    /// the expected format before retrying.
    #[serde(default = "default_true")]
    pub corrective_feedback: bool,
    /// Include the step history in the run output.
    #[serde(default)]
    pub return_intermediate_steps: bool,
    /// Extra template variables that callers must supply on every run.
    #[serde(default)]
    pub input_keys: Vec<String>,
    /// Replacement prompt template in Tera syntax.  Must only reference
    /// `input`, `tools`, `tool_names`, `agent_scratchpad` and `input_keys`.
    #[serde(default)]
    pub prompt_template: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            style: AgentStyleKind::React,
            max_iterations: default_max_iterations(),
            max_execution_time_secs: None,
            early_stopping_method: default_early_stopping_method(),
            max_decision_retries: default_max_decision_retries(),
            corrective_feedback: true,
            return_intermediate_steps: false,
            input_keys: Vec::new(),
            prompt_template: None,
        }
    }
}

fn default_shell_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Register the built-in `shell` tool
    #[serde(default)]
    pub shell_enabled: bool,
    /// Timeout in seconds for a single shell command
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell_enabled: false,
            shell_timeout_secs: default_shell_timeout_secs(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.agent.max_iterations, 15);
        assert_eq!(cfg.agent.early_stopping_method, "force");
        assert_eq!(cfg.agent.style, AgentStyleKind::React);
        assert!(cfg.agent.corrective_feedback);
        assert!(!cfg.tools.shell_enabled);
    }

    #[test]
    fn agent_section_overrides_individual_fields() {
        let cfg: Config = toml::from_str(
            r#"[agent]
style = "conversational"
max_iterations = 4
max_execution_time_secs = 2.5"#,
        )
        .unwrap();
        assert_eq!(cfg.agent.style, AgentStyleKind::Conversational);
        assert_eq!(cfg.agent.max_iterations, 4);
        assert_eq!(cfg.agent.max_execution_time_secs, Some(2.5));
        // untouched fields keep their defaults
        assert_eq!(cfg.agent.max_decision_retries, 2);
    }

    #[test]
    fn model_section_with_only_provider_keeps_other_defaults() {
        let cfg: Config = toml::from_str("[model]\nprovider = \"mock\"").unwrap();
        assert_eq!(cfg.model.provider, "mock");
        assert_eq!(cfg.model.name, "gpt-4o-mini");
        assert_eq!(cfg.model.api_key_env.as_deref(), Some("OPENAI_API_KEY"));
        assert_eq!(cfg.model.max_tokens, Some(1024));
    }

    #[test]
    fn unknown_style_is_rejected() {
        let res: Result<Config, _> = toml::from_str("[agent]\nstyle = \"telepathic\"");
        assert!(res.is_err());
    }

    #[test]
    fn early_stopping_method_is_kept_verbatim() {
        let cfg: Config = toml::from_str("[agent]\nearly_stopping_method = \"generate\"").unwrap();
        assert_eq!(cfg.agent.early_stopping_method, "generate");
    }

    #[test]
    fn style_display_matches_serde_name() {
        assert_eq!(AgentStyleKind::React.to_string(), "react");
        assert_eq!(AgentStyleKind::Conversational.to_string(), "conversational");
    }
}
