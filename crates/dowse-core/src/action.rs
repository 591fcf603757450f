// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use dowse_tools::ToolInput;

/// Key under which the final answer text is stored in
/// [`AgentFinish::return_values`].
pub const OUTPUT_KEY: &str = "output";

/// Tool name recorded on steps that carry corrective feedback for a
/// completion the parser rejected.  Never a registered tool.
pub const INVALID_OUTPUT_TOOL: &str = "_invalid_output";

/// A request to run one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentAction {
    pub tool: String,
    pub tool_input: ToolInput,
    /// The full model text that produced this decision.
    pub log: String,
}

/// The agent is done.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentFinish {
    pub return_values: BTreeMap<String, String>,
    pub log: String,
}

impl AgentFinish {
    pub fn new(output: impl Into<String>, log: impl Into<String>) -> Self {
        let mut return_values = BTreeMap::new();
        return_values.insert(OUTPUT_KEY.to_string(), output.into());
        Self { return_values, log: log.into() }
    }

    /// The primary answer text, empty when no `output` value was produced.
    pub fn output(&self) -> &str {
        self.return_values.get(OUTPUT_KEY).map(String::as_str).unwrap_or_default()
    }
}

/// One decision produced by the agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    ToolCall(AgentAction),
    Finish(AgentFinish),
}

/// How a step's observation came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The tool ran and returned output.
    Observed,
    /// The tool ran and reported an error; the error text is the observation.
    ToolFailed,
    /// The requested tool is not registered.
    UnknownTool,
    /// The model's text could not be parsed; the observation is corrective
    /// feedback for the next turn.
    InvalidOutput,
}

/// One completed act-then-observe cycle.  Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub action: AgentAction,
    pub observation: String,
    pub outcome: StepOutcome,
    pub recorded_at: DateTime<Utc>,
}

impl Step {
    pub fn new(action: AgentAction, observation: impl Into<String>, outcome: StepOutcome) -> Self {
        Self { action, observation: observation.into(), outcome, recorded_at: Utc::now() }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_exposes_output_value() {
        let f = AgentFinish::new("Paris", "Final Answer: Paris");
        assert_eq!(f.output(), "Paris");
        assert_eq!(f.return_values.len(), 1);
    }

    #[test]
    fn finish_without_output_key_reads_empty() {
        let f = AgentFinish { return_values: BTreeMap::new(), log: String::new() };
        assert_eq!(f.output(), "");
    }

    #[test]
    fn action_serializes_with_kind_tag() {
        let a = Action::ToolCall(AgentAction {
            tool: "search".into(),
            tool_input: ToolInput::from("rust"),
            log: "Action: search".into(),
        });
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["kind"], "tool_call");
        assert_eq!(v["tool_input"], "rust");
    }
}
