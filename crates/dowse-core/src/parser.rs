// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Turning raw model text into an [`Action`].
//!
//! Two conventions are supported:
//!
//! * **ReAct**: `Thought: … Action: <tool> Action Input: <input>` or
//!   `Final Answer: <answer>`, parsed by [`ReActOutputParser`].
//! * **Conversational**: a fenced JSON block with `action` and
//!   `action_input` fields, parsed by [`ConversationalOutputParser`].
//!
//! Parsing is a pure function of the text.  Every failure carries the raw
//! text so the executor can feed it back to the model.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use dowse_tools::ToolInput;

use crate::action::{Action, AgentAction, AgentFinish};

/// Why a completion could not be turned into an action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    #[error("missing 'Action:' after 'Thought:'")]
    MissingAction,
    #[error("missing 'Action Input:' after 'Action:'")]
    MissingActionInput,
    #[error("found both a tool call and a final answer")]
    Ambiguous,
    #[error("no JSON action block found")]
    NoActionBlock,
    #[error("action block is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("action block is missing the '{0}' field")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not parse model output: {cause}")]
pub struct ParseError {
    pub raw_text: String,
    pub cause: ParseFailure,
}

impl ParseError {
    fn new(raw_text: &str, cause: ParseFailure) -> Self {
        Self { raw_text: raw_text.to_string(), cause }
    }

    /// Feedback shown to the model on the next turn.
    pub fn corrective_feedback(&self) -> String {
        format!("Invalid or incomplete response: {}. Follow the required format exactly.", self.cause)
    }
}

pub trait OutputParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<Action, ParseError>;
}

// ─── ReAct ───────────────────────────────────────────────────────────────────

pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

fn action_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
            .expect("action pattern is valid")
    })
}

fn action_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Action\s*\d*\s*:").expect("action marker pattern is valid"))
}

/// Parser for the `Action:` / `Action Input:` / `Final Answer:` convention.
/// Markers are matched case-sensitively.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReActOutputParser;

impl OutputParser for ReActOutputParser {
    fn parse(&self, text: &str) -> Result<Action, ParseError> {
        let final_answer = text.split_once(FINAL_ANSWER_MARKER).map(|(_, rest)| rest.trim());

        if let Some(caps) = action_regex().captures(text) {
            if final_answer.is_some() {
                return Err(ParseError::new(text, ParseFailure::Ambiguous));
            }
            let tool = caps[1].trim();
            if tool.is_empty() {
                return Err(ParseError::new(text, ParseFailure::MissingAction));
            }
            return Ok(Action::ToolCall(AgentAction {
                tool: tool.to_string(),
                tool_input: ToolInput::Text(caps[2].trim().to_string()),
                log: text.to_string(),
            }));
        }

        // A malformed tool call is never read as a finish.
        if action_marker_regex().is_match(text) {
            return Err(ParseError::new(text, ParseFailure::MissingActionInput));
        }
        match final_answer {
            Some(answer) => Ok(Action::Finish(AgentFinish::new(answer, text))),
            None => Err(ParseError::new(text, ParseFailure::MissingAction)),
        }
    }
}

// ─── Conversational ──────────────────────────────────────────────────────────

/// `action` value that means "answer the user".
pub const FINAL_ANSWER_ACTION: &str = "Final Answer";

/// Parser for a fenced JSON block:
///
/// ```text
/// ```json
/// {"action": "search", "action_input": "rust"}
/// ```
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct ConversationalOutputParser;

impl OutputParser for ConversationalOutputParser {
    fn parse(&self, text: &str) -> Result<Action, ParseError> {
        let block = extract_json_block(text)
            .ok_or_else(|| ParseError::new(text, ParseFailure::NoActionBlock))?;
        let value: Value = serde_json::from_str(block)
            .map_err(|e| ParseError::new(text, ParseFailure::InvalidJson(e.to_string())))?;

        let action = value
            .get("action")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ParseError::new(text, ParseFailure::MissingField("action")))?;
        let input = value
            .get("action_input")
            .ok_or_else(|| ParseError::new(text, ParseFailure::MissingField("action_input")))?;

        if action == FINAL_ANSWER_ACTION {
            let output = match input {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            return Ok(Action::Finish(AgentFinish::new(output, text)));
        }

        let tool_input = match input {
            Value::String(s) => ToolInput::Text(s.trim().to_string()),
            Value::Object(map) => ToolInput::Keyed(map.clone()),
            other => ToolInput::Text(other.to_string()),
        };
        Ok(Action::ToolCall(AgentAction {
            tool: action.to_string(),
            tool_input,
            log: text.to_string(),
        }))
    }
}

/// Locate the JSON object in a completion: the first fenced block if there
/// is one, otherwise the whole text, otherwise the outermost `{…}` span.
fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let line_end = after.find('\n').unwrap_or(after.len());
        // The opening fence line may carry a language tag, and the object
        // may start on that same line.
        let body = match after[..line_end].find('{') {
            Some(brace) => &after[brace..],
            None => &after[(line_end + 1).min(after.len())..],
        };
        let end = body.find("```")?;
        return Some(body[..end].trim());
    }

    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    let open = text.find('{')?;
    let close = text.rfind('}')?;
    (close > open).then(|| &text[open..=close])
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
