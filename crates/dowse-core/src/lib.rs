// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod action;
mod agent;
mod error;
mod events;
mod executor;
mod parser;
mod prompts;
mod scratchpad;
mod style;

pub use action::{
    Action, AgentAction, AgentFinish, Step, StepOutcome, INVALID_OUTPUT_TOOL, OUTPUT_KEY,
};
pub use agent::{Agent, EarlyStoppingMethod, FORCE_STOP_MESSAGE};
pub use error::{AgentError, ExecutorError};
pub use events::ExecutorEvent;
pub use executor::{Executor, ExecutorBuilder, RunOutput, StopReason, StoppingPolicy};
pub use parser::{
    ConversationalOutputParser, OutputParser, ParseError, ParseFailure, ReActOutputParser,
    FINAL_ANSWER_ACTION, FINAL_ANSWER_MARKER,
};
pub use prompts::{
    PromptTemplate, TemplateError, INPUT_KEY, SCRATCHPAD_KEY, TOOLS_KEY, TOOL_NAMES_KEY,
};
pub use scratchpad::Scratchpad;
pub use style::{stop_sequences, AgentStyle, ScratchpadFormat};
