// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Serialize;

use crate::action::{AgentAction, StepOutcome};
use crate::executor::StopReason;

/// Progress events emitted during a single run.
/// Consumers (the CLI, tests) subscribe to these to follow the loop live.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutorEvent {
    /// A new plan/act iteration begins (1-based)
    IterationStarted { iteration: usize },
    /// The agent chose a tool
    ActionPlanned { action: AgentAction },
    /// A step was recorded
    ToolFinished {
        tool: String,
        observation: String,
        outcome: StepOutcome,
    },
    /// The agent produced no usable decision this time
    DecisionFailed { attempt: u32, error: String },
    /// A budget ran out and the stopped response was returned
    Stopped { reason: StopReason },
    /// The run is complete
    Finished { output: String },
}
