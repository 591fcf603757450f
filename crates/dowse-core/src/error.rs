// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use crate::parser::ParseError;
use crate::prompts::TemplateError;

/// Why one planning call produced no decision.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    /// The model collaborator failed (network, quota, provider error).
    #[error("model invocation failed: {message}")]
    ModelInvocation { message: String },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl AgentError {
    pub fn model(err: impl std::fmt::Display) -> Self {
        Self::ModelInvocation { message: err.to_string() }
    }
}

/// Errors that end a run (or prevent an executor from being built).
/// Tool failures and unknown tools are never in this list: they become
/// observations instead.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("agent could not produce a usable decision after {attempts} attempts: {last_error}")]
    AgentDecisionFailure {
        attempts: u32,
        #[source]
        last_error: AgentError,
    },
    #[error("unknown early stopping method '{0}' (supported: force)")]
    UnknownEarlyStoppingPolicy(String),
    #[error("missing input variable '{0}'")]
    MissingInput(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
}
