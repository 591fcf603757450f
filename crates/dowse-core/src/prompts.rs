// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Prompt templates.
//!
//! Templates are rendered with Tera, so placeholders are written
//! `{{ name }}` and single braces pass through untouched, which keeps JSON
//! examples readable.  A template can be checked against the set of names
//! the executor will supply before any run starts.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tera::{Context, Tera};

/// Variable holding the caller's request.
pub const INPUT_KEY: &str = "input";
/// Variable holding the rendered step history.
pub const SCRATCHPAD_KEY: &str = "agent_scratchpad";
/// Variable holding `name: description` lines for every tool.
pub const TOOLS_KEY: &str = "tools";
/// Variable holding the comma-separated tool names.
pub const TOOL_NAMES_KEY: &str = "tool_names";

const TEMPLATE_NAME: &str = "prompt";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("invalid prompt template: {0}")]
    Syntax(String),
    #[error("prompt template variable '{0}' has no value")]
    MissingVariable(String),
    #[error("prompt template references unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("failed to render prompt template: {0}")]
    Render(String),
}

#[derive(Clone)]
pub struct PromptTemplate {
    tera: Arc<Tera>,
    source: String,
}

impl PromptTemplate {
    pub fn new(template: &str) -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        tera.add_raw_template(TEMPLATE_NAME, template)
            .map_err(|e| TemplateError::Syntax(error_chain(&e)))?;
        Ok(Self { tera: Arc::new(tera), source: template.to_string() })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Fail with [`TemplateError::UnknownVariable`] if the template uses a
    /// name outside `known`.  Renders once with every known name bound to
    /// an empty string and lets Tera report what is left undefined.
    pub fn check_variables<'a>(
        &self,
        known: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), TemplateError> {
        let mut context = Context::new();
        for key in known {
            context.insert(key, "");
        }
        self.tera
            .render(TEMPLATE_NAME, &context)
            .map(drop)
            .map_err(|e| classify(&e, TemplateError::UnknownVariable))
    }

    /// Substitute every placeholder.  Extra entries in `vars` are ignored.
    pub fn format(&self, vars: &HashMap<String, String>) -> Result<String, TemplateError> {
        let mut context = Context::new();
        for (key, value) in vars {
            context.insert(key.as_str(), value);
        }
        self.tera
            .render(TEMPLATE_NAME, &context)
            .map_err(|e| classify(&e, TemplateError::MissingVariable))
    }
}

impl fmt::Debug for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptTemplate").field("source", &self.source).finish()
    }
}

impl PartialEq for PromptTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Tera nests the useful message in the error's source chain.
fn error_chain(err: &tera::Error) -> String {
    let mut msg = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

fn undefined_variable_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Variable `([^`]+)` not found").expect("undefined variable pattern is valid")
    })
}

fn classify(err: &tera::Error, undefined: fn(String) -> TemplateError) -> TemplateError {
    let msg = error_chain(err);
    match undefined_variable_regex().captures(&msg) {
        Some(caps) => undefined(caps[1].to_string()),
        None => TemplateError::Render(msg),
    }
}

// ─── Default templates ───────────────────────────────────────────────────────

/// Single-prompt template for the `Thought / Action / Action Input` convention.
pub const REACT_TEMPLATE: &str = "\
Answer the question below as well as you can. You can use these tools:

{{ tools }}

Always reply in exactly this format:

Question: the question you must answer
Thought: reason about what to do next
Action: the tool to use, exactly one of [{{ tool_names }}]
Action Input: the input for that tool
Observation: what the tool returned
... (Thought / Action / Action Input / Observation may repeat)
Thought: I know the final answer
Final Answer: the answer to the original question

Begin!

Question: {{ input }}
Thought:{{ agent_scratchpad }}";

/// System turn for the conversational (JSON block) convention.
pub const CONVERSATIONAL_SYSTEM_TEMPLATE: &str = "\
You are an assistant that can use tools to answer the user.

Available tools:

{{ tools }}

Every reply must be a single markdown code block containing one JSON \
object, and nothing else.

To use a tool:

```json
{
    \"action\": \"one of [{{ tool_names }}]\",
    \"action_input\": \"the input for the tool\"
}
```

To answer the user:

```json
{
    \"action\": \"Final Answer\",
    \"action_input\": \"your answer\"
}
```";

/// User turn for the conversational convention.
pub const CONVERSATIONAL_USER_TEMPLATE: &str = "{{ input }}";

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_placeholders() {
        let t = PromptTemplate::new("Hello {{ name }}, you are {{age}}.").unwrap();
        let out = t.format(&vars(&[("name", "Ada"), ("age", "36")])).unwrap();
        assert_eq!(out, "Hello Ada, you are 36.");
    }

    #[test]
    fn single_braces_are_literal() {
        let t = PromptTemplate::new(r#"{"action": "{{ tool }}"}"#).unwrap();
        let out = t.format(&vars(&[("tool", "search")])).unwrap();
        assert_eq!(out, r#"{"action": "search"}"#);
    }

    #[test]
    fn values_are_not_escaped() {
        let t = PromptTemplate::new("{{ input }}").unwrap();
        let out = t.format(&vars(&[("input", "<a href=\"x\">&</a>")])).unwrap();
        assert_eq!(out, "<a href=\"x\">&</a>");
    }

    #[test]
    fn missing_variable_is_reported() {
        let t = PromptTemplate::new("{{ a }} and {{ b }}").unwrap();
        let err = t.format(&vars(&[("a", "1")])).unwrap_err();
        assert_eq!(err, TemplateError::MissingVariable("b".into()));
    }

    #[test]
    fn malformed_template_is_rejected() {
        assert!(matches!(PromptTemplate::new("{{ open"), Err(TemplateError::Syntax(_))));
        assert!(matches!(PromptTemplate::new("{% if x %}never closed"), Err(TemplateError::Syntax(_))));
    }

    #[test]
    fn check_variables_flags_unknown_names() {
        let t = PromptTemplate::new("{{ input }} {{ persona }}").unwrap();
        assert!(t.check_variables(["input", "persona"]).is_ok());
        assert_eq!(
            t.check_variables(["input"]).unwrap_err(),
            TemplateError::UnknownVariable("persona".into())
        );
    }

    #[test]
    fn default_templates_parse_with_reserved_variables() {
        let reserved = [INPUT_KEY, SCRATCHPAD_KEY, TOOLS_KEY, TOOL_NAMES_KEY];
        for src in [REACT_TEMPLATE, CONVERSATIONAL_SYSTEM_TEMPLATE, CONVERSATIONAL_USER_TEMPLATE] {
            let t = PromptTemplate::new(src).unwrap();
            t.check_variables(reserved).unwrap();
        }
    }

    #[test]
    fn conversational_system_template_renders_json_braces() {
        let t = PromptTemplate::new(CONVERSATIONAL_SYSTEM_TEMPLATE).unwrap();
        let out = t
            .format(&vars(&[("tools", "search: web search"), ("tool_names", "search")]))
            .unwrap();
        assert!(out.contains("\"action\": \"Final Answer\""));
        assert!(out.contains("{\n    \"action\""));
    }
}
