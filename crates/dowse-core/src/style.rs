// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use dowse_config::AgentStyleKind;

use crate::parser::{ConversationalOutputParser, OutputParser, ReActOutputParser};
use crate::prompts::{
    PromptTemplate, TemplateError, CONVERSATIONAL_SYSTEM_TEMPLATE, CONVERSATIONAL_USER_TEMPLATE,
    REACT_TEMPLATE,
};
use crate::scratchpad::Scratchpad;

/// How the step history reaches the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchpadFormat {
    /// Substituted into the prompt as the `agent_scratchpad` variable.
    Text,
    /// Appended to the conversation as alternating assistant/user turns.
    Messages,
}

/// Everything that distinguishes one prompting convention from another.
/// The agent itself is style-agnostic.
#[derive(Clone)]
pub struct AgentStyle {
    pub kind: AgentStyleKind,
    pub system_prompt: Option<PromptTemplate>,
    pub prompt: PromptTemplate,
    pub scratchpad: Scratchpad,
    pub scratchpad_format: ScratchpadFormat,
    pub stop: Vec<String>,
    pub parser: Arc<dyn OutputParser>,
}

impl AgentStyle {
    pub fn react() -> Self {
        Self::react_with_prompt(default_template(REACT_TEMPLATE))
    }

    pub fn react_with_prompt(prompt: PromptTemplate) -> Self {
        let scratchpad = Scratchpad::new("Observation: ", "Thought:");
        Self {
            kind: AgentStyleKind::React,
            system_prompt: None,
            prompt,
            stop: stop_sequences(&scratchpad.observation_prefix),
            scratchpad,
            scratchpad_format: ScratchpadFormat::Text,
            parser: Arc::new(ReActOutputParser),
        }
    }

    pub fn conversational() -> Self {
        Self::conversational_with_prompt(default_template(CONVERSATIONAL_USER_TEMPLATE))
    }

    pub fn conversational_with_prompt(prompt: PromptTemplate) -> Self {
        let scratchpad = Scratchpad::new(
            "TOOL RESPONSE:\n",
            "Answer with a single markdown code block containing one JSON action, and nothing else.",
        );
        Self {
            kind: AgentStyleKind::Conversational,
            system_prompt: Some(default_template(CONVERSATIONAL_SYSTEM_TEMPLATE)),
            prompt,
            stop: stop_sequences(&scratchpad.observation_prefix),
            scratchpad,
            scratchpad_format: ScratchpadFormat::Messages,
            parser: Arc::new(ConversationalOutputParser),
        }
    }

    pub fn from_kind(kind: AgentStyleKind) -> Self {
        match kind {
            AgentStyleKind::React => Self::react(),
            AgentStyleKind::Conversational => Self::conversational(),
        }
    }

    /// Same style with a caller-supplied main prompt.
    pub fn with_prompt_source(kind: AgentStyleKind, source: &str) -> Result<Self, TemplateError> {
        let prompt = PromptTemplate::new(source)?;
        Ok(match kind {
            AgentStyleKind::React => Self::react_with_prompt(prompt),
            AgentStyleKind::Conversational => Self::conversational_with_prompt(prompt),
        })
    }

    /// Check the system and main prompts against the names a run supplies.
    pub fn check_variables(&self, known: &[&str]) -> Result<(), TemplateError> {
        if let Some(system) = &self.system_prompt {
            system.check_variables(known.iter().copied())?;
        }
        self.prompt.check_variables(known.iter().copied())
    }
}

impl std::fmt::Debug for AgentStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentStyle")
            .field("kind", &self.kind)
            .field("scratchpad", &self.scratchpad)
            .field("scratchpad_format", &self.scratchpad_format)
            .field("stop", &self.stop)
            .finish_non_exhaustive()
    }
}

/// Stop sequences that end the model's turn right before it would invent
/// an observation of its own.
pub fn stop_sequences(observation_prefix: &str) -> Vec<String> {
    let label = observation_prefix.trim_end();
    vec![format!("\n{label}"), format!("\n\t{label}")]
}

fn default_template(source: &str) -> PromptTemplate {
    // Built-in templates are covered by the prompts tests.
    PromptTemplate::new(source).unwrap_or_else(|e| panic!("built-in prompt template is invalid: {e}"))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;

    #[test]
    fn react_style_stops_before_observation() {
        let s = AgentStyle::react();
        assert_eq!(s.stop, vec!["\nObservation:".to_string(), "\n\tObservation:".to_string()]);
        assert_eq!(s.scratchpad_format, ScratchpadFormat::Text);
        assert!(s.system_prompt.is_none());
    }

    #[test]
    fn conversational_style_uses_messages() {
        let s = AgentStyle::conversational();
        assert_eq!(s.kind, AgentStyleKind::Conversational);
        assert_eq!(s.scratchpad_format, ScratchpadFormat::Messages);
        assert!(s.system_prompt.is_some());
        assert_eq!(s.stop[0], "\nTOOL RESPONSE:");
    }

    #[test]
    fn from_kind_selects_parser() {
        let react = AgentStyle::from_kind(AgentStyleKind::React);
        assert!(matches!(react.parser.parse("Final Answer: x"), Ok(Action::Finish(_))));
        let convo = AgentStyle::from_kind(AgentStyleKind::Conversational);
        assert!(convo.parser.parse("Final Answer: x").is_err());
    }

    #[test]
    fn custom_prompt_replaces_main_template() {
        let s = AgentStyle::with_prompt_source(
            AgentStyleKind::React,
            "{{ persona }}: {{ input }}{{ agent_scratchpad }}",
        )
        .unwrap();
        assert!(s.check_variables(&["persona", "input", "agent_scratchpad"]).is_ok());
        assert_eq!(
            s.check_variables(&["input", "agent_scratchpad"]).unwrap_err(),
            TemplateError::UnknownVariable("persona".into())
        );
    }

    #[test]
    fn invalid_custom_prompt_is_rejected() {
        assert!(AgentStyle::with_prompt_source(AgentStyleKind::React, "{{ unclosed").is_err());
    }
}
