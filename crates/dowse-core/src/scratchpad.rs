// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use dowse_model::Message;

use crate::action::Step;

/// Renders the step history into the context the model sees next.
///
/// Both renderings are pure functions of the step list, and the rendering
/// of a list is always a prefix of the rendering of any extension of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scratchpad {
    pub observation_prefix: String,
    pub llm_prefix: String,
}

impl Scratchpad {
    pub fn new(observation_prefix: impl Into<String>, llm_prefix: impl Into<String>) -> Self {
        Self { observation_prefix: observation_prefix.into(), llm_prefix: llm_prefix.into() }
    }

    /// Single-string form: each step's log, then the labelled observation,
    /// then the cue for the model's next thought.
    pub fn build(&self, steps: &[Step]) -> String {
        let mut out = String::new();
        for step in steps {
            out.push_str(&step.action.log);
            out.push('\n');
            out.push_str(&self.observation_prefix);
            out.push_str(&step.observation);
            out.push('\n');
            out.push_str(&self.llm_prefix);
        }
        out
    }

    /// Message form: the model's own text as an assistant turn followed by
    /// the observation as a user turn.
    pub fn build_messages(&self, steps: &[Step]) -> Vec<Message> {
        steps
            .iter()
            .flat_map(|step| {
                [
                    Message::assistant(step.action.log.clone()),
                    Message::user(format!(
                        "{}{}\n\n{}",
                        self.observation_prefix, step.observation, self.llm_prefix
                    )),
                ]
            })
            .collect()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
