// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use dowse_model::{truncate_at_stop, CompletionRequest, Message, ModelProvider};
use dowse_tools::ToolRegistry;

use crate::{
    action::{Action, AgentFinish, Step},
    error::{AgentError, ExecutorError},
    prompts::{TemplateError, INPUT_KEY, SCRATCHPAD_KEY, TOOLS_KEY, TOOL_NAMES_KEY},
    style::{AgentStyle, ScratchpadFormat},
};

/// Final answer used when a run is cut short by a budget.
pub const FORCE_STOP_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

/// What to return when the iteration or time budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EarlyStoppingMethod {
    /// Return a fixed message without consulting the model again.
    #[default]
    Force,
}

impl FromStr for EarlyStoppingMethod {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "force" => Ok(Self::Force),
            other => Err(ExecutorError::UnknownEarlyStoppingPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for EarlyStoppingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Force => f.write_str("force"),
        }
    }
}

/// Turns the request plus the step history into the next decision.
///
/// The agent holds no per-run state: everything it needs arrives as
/// arguments to [`Agent::plan`], so one agent can serve many concurrent runs.
pub struct Agent {
    model: Arc<dyn ModelProvider>,
    style: AgentStyle,
    tool_descriptions: String,
    tool_names: String,
}

impl Agent {
    pub fn new(model: Arc<dyn ModelProvider>, style: AgentStyle, tools: &ToolRegistry) -> Self {
        Self {
            model,
            style,
            tool_descriptions: tools.describe(),
            tool_names: tools.names().join(", "),
        }
    }

    pub fn style(&self) -> &AgentStyle {
        &self.style
    }

    /// Ensure every prompt variable is either reserved or one of `input_keys`.
    pub fn check_prompt(&self, input_keys: &[String]) -> Result<(), TemplateError> {
        let known = [INPUT_KEY, SCRATCHPAD_KEY, TOOLS_KEY, TOOL_NAMES_KEY]
            .into_iter()
            .chain(input_keys.iter().map(String::as_str));
        let known: Vec<&str> = known.collect();
        self.style.check_variables(&known)
    }

    /// Render the prompt for the current history.
    pub fn build_request(
        &self,
        steps: &[Step],
        inputs: &HashMap<String, String>,
    ) -> Result<CompletionRequest, TemplateError> {
        let mut vars = inputs.clone();
        vars.insert(TOOLS_KEY.to_string(), self.tool_descriptions.clone());
        vars.insert(TOOL_NAMES_KEY.to_string(), self.tool_names.clone());
        let scratchpad = match self.style.scratchpad_format {
            ScratchpadFormat::Text => self.style.scratchpad.build(steps),
            ScratchpadFormat::Messages => String::new(),
        };
        vars.insert(SCRATCHPAD_KEY.to_string(), scratchpad);

        let mut messages = Vec::with_capacity(2 + steps.len() * 2);
        if let Some(system) = &self.style.system_prompt {
            messages.push(Message::system(system.format(&vars)?));
        }
        messages.push(Message::user(self.style.prompt.format(&vars)?));
        if self.style.scratchpad_format == ScratchpadFormat::Messages {
            messages.extend(self.style.scratchpad.build_messages(steps));
        }

        Ok(CompletionRequest {
            messages,
            stop: self.style.stop.clone(),
            ..CompletionRequest::default()
        })
    }

    /// Ask the model for the next decision.
    pub async fn plan(
        &self,
        steps: &[Step],
        inputs: &HashMap<String, String>,
    ) -> Result<Action, AgentError> {
        let request = self.build_request(steps, inputs)?;
        let completion = self
            .model
            .complete(request)
            .await
            .map_err(|e| AgentError::model(format!("{e:#}")))?;

        // Providers that ignore stop sequences still must not leak an
        // invented observation into the parser.
        let text = truncate_at_stop(&completion.text, &self.style.stop);
        debug!(
            model = self.model.model_name(),
            steps = steps.len(),
            chars = text.len(),
            "model completion received"
        );
        Ok(self.style.parser.parse(text)?)
    }

    /// The answer returned when a budget runs out.
    pub fn return_stopped_response(&self, method: EarlyStoppingMethod, steps: &[Step]) -> AgentFinish {
        match method {
            EarlyStoppingMethod::Force => {
                AgentFinish::new(FORCE_STOP_MESSAGE, format!("stopped after {} steps", steps.len()))
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use dowse_model::{Role, ScriptedMockProvider};

    use super::*;
    use crate::action::{AgentAction, StepOutcome};
    use crate::prompts::PromptTemplate;

    fn inputs(q: &str) -> HashMap<String, String> {
        HashMap::from([(INPUT_KEY.to_string(), q.to_string())])
    }

    fn step(log: &str, obs: &str) -> Step {
        Step::new(
            AgentAction { tool: "search".into(), tool_input: "q".into(), log: log.into() },
            obs,
            StepOutcome::Observed,
        )
    }

    #[test]
    fn early_stopping_method_parses_force_only() {
        assert_eq!("force".parse::<EarlyStoppingMethod>().unwrap(), EarlyStoppingMethod::Force);
        let err = "generate".parse::<EarlyStoppingMethod>().unwrap_err();
        assert!(matches!(err, ExecutorError::UnknownEarlyStoppingPolicy(ref m) if m == "generate"));
    }

    #[test]
    fn react_request_embeds_scratchpad_and_stop() {
        let model = Arc::new(ScriptedMockProvider::always_text("Final Answer: x"));
        let agent = Agent::new(model, AgentStyle::react(), &ToolRegistry::default());
        let req = agent
            .build_request(&[step(" look\nAction: search\nAction Input: q", "found")], &inputs("why?"))
            .unwrap();
        assert_eq!(req.messages.len(), 1);
        let prompt = &req.messages[0].content;
        assert!(prompt.contains("Question: why?"));
        assert!(prompt.ends_with("Action Input: q\nObservation: found\nThought:"));
        assert_eq!(req.stop, AgentStyle::react().stop);
    }

    #[test]
    fn conversational_request_appends_history_messages() {
        let model = Arc::new(ScriptedMockProvider::always_text(""));
        let agent = Agent::new(model, AgentStyle::conversational(), &ToolRegistry::default());
        let req = agent.build_request(&[step("{}", "sunny")], &inputs("weather?")).unwrap();
        let roles: Vec<Role> = req.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(req.messages[1].content, "weather?");
    }

    #[test]
    fn check_prompt_accepts_declared_input_keys() {
        let model = Arc::new(ScriptedMockProvider::always_text(""));
        let style = AgentStyle::react_with_prompt(PromptTemplate::new("{{ persona }} {{ input }}").unwrap());
        let agent = Agent::new(model, style, &ToolRegistry::default());
        assert!(agent.check_prompt(&["persona".to_string()]).is_ok());
        assert_eq!(
            agent.check_prompt(&[]).unwrap_err(),
            TemplateError::UnknownVariable("persona".into())
        );
    }

    #[tokio::test]
    async fn plan_truncates_invented_observation() {
        let model = Arc::new(ScriptedMockProvider::always_text(
            " search it\nAction: search\nAction Input: rust\nObservation: made up\nFinal Answer: no",
        ));
        // The mock already honours stop sequences; plan must also cope with
        // providers that do not.
        let agent = Agent::new(model, AgentStyle::react(), &ToolRegistry::default());
        match agent.plan(&[], &inputs("q")).await.unwrap() {
            Action::ToolCall(a) => {
                assert_eq!(a.tool, "search");
                assert_eq!(a.tool_input.as_text(), "rust");
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn plan_maps_model_failure() {
        let model = Arc::new(ScriptedMockProvider::new(vec![dowse_model::ScriptedReply::Error(
            "quota exceeded".into(),
        )]));
        let agent = Agent::new(model, AgentStyle::react(), &ToolRegistry::default());
        let err = agent.plan(&[], &inputs("q")).await.unwrap_err();
        assert!(matches!(err, AgentError::ModelInvocation { ref message } if message.contains("quota exceeded")));
    }

    #[tokio::test]
    async fn plan_maps_parse_failure() {
        let model = Arc::new(ScriptedMockProvider::always_text("no idea"));
        let agent = Agent::new(model, AgentStyle::react(), &ToolRegistry::default());
        assert!(matches!(agent.plan(&[], &inputs("q")).await, Err(AgentError::Parse(_))));
    }

    #[test]
    fn force_stop_response_is_fixed() {
        let model = Arc::new(ScriptedMockProvider::always_text(""));
        let agent = Agent::new(model, AgentStyle::react(), &ToolRegistry::default());
        let f = agent.return_stopped_response(EarlyStoppingMethod::Force, &[step("a", "b")]);
        assert_eq!(f.output(), FORCE_STOP_MESSAGE);
    }
}
