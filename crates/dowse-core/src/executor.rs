// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use dowse_config::AgentConfig;
use dowse_model::ModelProvider;
use dowse_tools::ToolRegistry;

use crate::{
    action::{Action, AgentAction, AgentFinish, Step, StepOutcome, INVALID_OUTPUT_TOOL},
    agent::{Agent, EarlyStoppingMethod},
    error::{AgentError, ExecutorError},
    events::ExecutorEvent,
    parser::ParseError,
    prompts::INPUT_KEY,
    style::AgentStyle,
};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The agent produced a final answer.
    Finished,
    /// A `return_direct` tool's output became the answer.
    ReturnDirect,
    IterationLimit,
    TimeLimit,
}

/// Budgets checked before every model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoppingPolicy {
    pub max_iterations: usize,
    pub max_execution_time: Option<Duration>,
    pub early_stopping: EarlyStoppingMethod,
}

impl Default for StoppingPolicy {
    fn default() -> Self {
        Self { max_iterations: 15, max_execution_time: None, early_stopping: EarlyStoppingMethod::Force }
    }
}

impl StoppingPolicy {
    /// The budget that is exhausted, if any.
    pub fn exhausted(&self, iterations: usize, elapsed: Duration) -> Option<StopReason> {
        if iterations >= self.max_iterations {
            return Some(StopReason::IterationLimit);
        }
        match self.max_execution_time {
            Some(limit) if elapsed >= limit => Some(StopReason::TimeLimit),
            _ => None,
        }
    }
}

/// Result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub run_id: Uuid,
    pub output: String,
    pub return_values: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermediate_steps: Option<Vec<Step>>,
    pub stop_reason: StopReason,
    /// Number of recorded steps.
    pub iterations: usize,
}

/// Per-run bookkeeping.  Lives on the stack of one `run` call.
struct RunState<'a> {
    id: Uuid,
    started: Instant,
    events: Option<&'a mpsc::Sender<ExecutorEvent>>,
}

impl RunState<'_> {
    async fn emit(&self, event: ExecutorEvent) {
        if let Some(tx) = self.events {
            let _ = tx.send(event).await;
        }
    }
}

/// Drives the plan → act → observe loop.
///
/// An executor is immutable once built and may be shared (e.g. behind an
/// `Arc`) by any number of concurrent runs; every run keeps its own step
/// history.
pub struct Executor {
    agent: Agent,
    tools: Arc<ToolRegistry>,
    policy: StoppingPolicy,
    max_decision_retries: u32,
    corrective_feedback: bool,
    return_intermediate_steps: bool,
    input_keys: Vec<String>,
}

impl Executor {
    pub fn builder(model: Arc<dyn ModelProvider>, tools: Arc<ToolRegistry>) -> ExecutorBuilder {
        ExecutorBuilder::new(model, tools)
    }

    /// Build an executor from the `[agent]` configuration section.
    pub fn from_config(
        cfg: &AgentConfig,
        model: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
    ) -> Result<Self, ExecutorError> {
        let style = match &cfg.prompt_template {
            Some(source) => AgentStyle::with_prompt_source(cfg.style, source)?,
            None => AgentStyle::from_kind(cfg.style),
        };
        let max_execution_time = cfg.max_execution_time_secs.and_then(|secs| {
            let limit = Duration::try_from_secs_f64(secs).ok();
            if limit.is_none() {
                warn!(secs, "ignoring invalid max_execution_time_secs");
            }
            limit
        });
        Self::builder(model, tools)
            .style(style)
            .max_iterations(cfg.max_iterations as usize)
            .max_execution_time(max_execution_time)
            .early_stopping_method(cfg.early_stopping_method.clone())
            .max_decision_retries(cfg.max_decision_retries)
            .corrective_feedback(cfg.corrective_feedback)
            .return_intermediate_steps(cfg.return_intermediate_steps)
            .input_keys(cfg.input_keys.clone())
            .build()
    }

    pub fn policy(&self) -> &StoppingPolicy {
        &self.policy
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub async fn run(&self, input: &str) -> Result<RunOutput, ExecutorError> {
        self.execute(input, HashMap::new(), None).await
    }

    /// Run with extra template variables (the configured `input_keys`).
    pub async fn run_with_inputs(
        &self,
        input: &str,
        inputs: HashMap<String, String>,
    ) -> Result<RunOutput, ExecutorError> {
        self.execute(input, inputs, None).await
    }

    /// Run while streaming progress to `tx`.  Send errors (receiver gone)
    /// are ignored.
    pub async fn run_with_events(
        &self,
        input: &str,
        inputs: HashMap<String, String>,
        tx: mpsc::Sender<ExecutorEvent>,
    ) -> Result<RunOutput, ExecutorError> {
        self.execute(input, inputs, Some(&tx)).await
    }

    async fn execute(
        &self,
        input: &str,
        mut inputs: HashMap<String, String>,
        events: Option<&mpsc::Sender<ExecutorEvent>>,
    ) -> Result<RunOutput, ExecutorError> {
        inputs.insert(INPUT_KEY.to_string(), input.to_string());
        if let Some(missing) = self.input_keys.iter().find(|k| !inputs.contains_key(k.as_str())) {
            return Err(ExecutorError::MissingInput(missing.clone()));
        }

        let run = RunState { id: Uuid::new_v4(), started: Instant::now(), events };
        let mut steps: Vec<Step> = Vec::new();
        let mut failures = 0u32;
        debug!(run_id = %run.id, style = %self.agent.style().kind, "run started");

        loop {
            if let Some(reason) = self.policy.exhausted(steps.len(), run.started.elapsed()) {
                return Ok(self.stopped(&run, steps, reason).await);
            }
            run.emit(ExecutorEvent::IterationStarted { iteration: steps.len() + 1 }).await;

            let Some(planned) = self.within_budget(&run, self.agent.plan(&steps, &inputs)).await else {
                return Ok(self.stopped(&run, steps, StopReason::TimeLimit).await);
            };

            let action = match planned {
                Ok(Action::ToolCall(action)) => action,
                Ok(Action::Finish(finish)) => {
                    return Ok(self.finish(&run, finish, steps, StopReason::Finished).await);
                }
                Err(AgentError::Template(e)) => return Err(e.into()),
                Err(err) => {
                    failures += 1;
                    warn!(run_id = %run.id, attempt = failures, "agent decision failed: {err}");
                    run.emit(ExecutorEvent::DecisionFailed { attempt: failures, error: err.to_string() })
                        .await;
                    if failures > self.max_decision_retries {
                        return Err(ExecutorError::AgentDecisionFailure { attempts: failures, last_error: err });
                    }
                    if let (AgentError::Parse(parse), true) = (&err, self.corrective_feedback) {
                        let step = invalid_output_step(parse);
                        run.emit(ExecutorEvent::ToolFinished {
                            tool: step.action.tool.clone(),
                            observation: step.observation.clone(),
                            outcome: step.outcome,
                        })
                        .await;
                        steps.push(step);
                    }
                    continue;
                }
            };

            debug!(run_id = %run.id, tool = %action.tool, "action planned");
            run.emit(ExecutorEvent::ActionPlanned { action: action.clone() }).await;

            let (observation, outcome, return_direct) = match self.tools.get(&action.tool) {
                None => {
                    warn!(run_id = %run.id, tool = %action.tool, "agent requested an unknown tool");
                    let names = self.tools.names().join(", ");
                    let observation = format!("{} is not a valid tool, try one of [{names}].", action.tool);
                    (observation, StepOutcome::UnknownTool, false)
                }
                Some(tool) => match self.within_budget(&run, tool.run(&action.tool_input)).await {
                    None => return Ok(self.stopped(&run, steps, StopReason::TimeLimit).await),
                    Some(Ok(output)) => (output, StepOutcome::Observed, tool.return_direct()),
                    Some(Err(e)) => {
                        warn!(run_id = %run.id, tool = %action.tool, "tool failed: {e}");
                        (e.to_string(), StepOutcome::ToolFailed, false)
                    }
                },
            };

            run.emit(ExecutorEvent::ToolFinished {
                tool: action.tool.clone(),
                observation: observation.clone(),
                outcome,
            })
            .await;
            let direct_answer = return_direct.then(|| observation.clone());
            steps.push(Step::new(action, observation, outcome));

            if let Some(answer) = direct_answer {
                let finish = AgentFinish::new(answer, "returned directly by tool");
                return Ok(self.finish(&run, finish, steps, StopReason::ReturnDirect).await);
            }
        }
    }

    /// Await `fut`, giving up when the run's time budget runs out.  `None`
    /// means the budget expired first; whatever `fut` was doing is dropped.
    async fn within_budget<F: Future>(&self, run: &RunState<'_>, fut: F) -> Option<F::Output> {
        match self.policy.max_execution_time {
            None => Some(fut.await),
            Some(limit) => {
                let remaining = limit.saturating_sub(run.started.elapsed());
                tokio::time::timeout(remaining, fut).await.ok()
            }
        }
    }

    async fn stopped(&self, run: &RunState<'_>, steps: Vec<Step>, reason: StopReason) -> RunOutput {
        info!(run_id = %run.id, ?reason, steps = steps.len(), "budget exhausted, stopping run");
        run.emit(ExecutorEvent::Stopped { reason }).await;
        let finish = self.agent.return_stopped_response(self.policy.early_stopping, &steps);
        self.finish(run, finish, steps, reason).await
    }

    async fn finish(
        &self,
        run: &RunState<'_>,
        finish: AgentFinish,
        steps: Vec<Step>,
        stop_reason: StopReason,
    ) -> RunOutput {
        let iterations = steps.len();
        info!(
            run_id = %run.id,
            iterations,
            ?stop_reason,
            elapsed_ms = run.started.elapsed().as_millis() as u64,
            "run finished"
        );
        let output = finish.output().to_string();
        run.emit(ExecutorEvent::Finished { output: output.clone() }).await;
        RunOutput {
            run_id: run.id,
            output,
            return_values: finish.return_values,
            intermediate_steps: self.return_intermediate_steps.then_some(steps),
            stop_reason,
            iterations,
        }
    }
}

/// Step that shows the model its rejected text and what was wrong with it.
fn invalid_output_step(err: &ParseError) -> Step {
    Step::new(
        AgentAction {
            tool: INVALID_OUTPUT_TOOL.to_string(),
            tool_input: err.raw_text.clone().into(),
            log: err.raw_text.clone(),
        },
        err.corrective_feedback(),
        StepOutcome::InvalidOutput,
    )
}

// ─── Builder ─────────────────────────────────────────────────────────────────

pub struct ExecutorBuilder {
    model: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    style: AgentStyle,
    policy: StoppingPolicy,
    early_stopping_method: Option<String>,
    max_decision_retries: u32,
    corrective_feedback: bool,
    return_intermediate_steps: bool,
    input_keys: Vec<String>,
}

impl ExecutorBuilder {
    pub fn new(model: Arc<dyn ModelProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            tools,
            style: AgentStyle::react(),
            policy: StoppingPolicy::default(),
            early_stopping_method: None,
            max_decision_retries: 2,
            corrective_feedback: true,
            return_intermediate_steps: false,
            input_keys: Vec::new(),
        }
    }

    pub fn style(mut self, style: AgentStyle) -> Self {
        self.style = style;
        self
    }

    pub fn max_iterations(mut self, n: usize) -> Self {
        self.policy.max_iterations = n;
        self
    }

    pub fn max_execution_time(mut self, limit: Option<Duration>) -> Self {
        self.policy.max_execution_time = limit;
        self
    }

    /// Validated in [`ExecutorBuilder::build`].
    pub fn early_stopping_method(mut self, method: impl Into<String>) -> Self {
        self.early_stopping_method = Some(method.into());
        self
    }

    pub fn max_decision_retries(mut self, n: u32) -> Self {
        self.max_decision_retries = n;
        self
    }

    pub fn corrective_feedback(mut self, on: bool) -> Self {
        self.corrective_feedback = on;
        self
    }

    pub fn return_intermediate_steps(mut self, on: bool) -> Self {
        self.return_intermediate_steps = on;
        self
    }

    pub fn input_keys(mut self, keys: Vec<String>) -> Self {
        self.input_keys = keys;
        self
    }

    /// Fails on an unknown early-stopping method or a prompt that references
    /// a variable nobody will supply.
    pub fn build(mut self) -> Result<Executor, ExecutorError> {
        if let Some(method) = &self.early_stopping_method {
            self.policy.early_stopping = method.parse()?;
        }
        let agent = Agent::new(self.model, self.style, &self.tools);
        agent.check_prompt(&self.input_keys)?;
        Ok(Executor {
            agent,
            tools: self.tools,
            policy: self.policy,
            max_decision_retries: self.max_decision_retries,
            corrective_feedback: self.corrective_feedback,
            return_intermediate_steps: self.return_intermediate_steps,
            input_keys: self.input_keys,
        })
    }
}
