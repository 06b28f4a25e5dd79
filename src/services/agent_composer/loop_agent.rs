//! LoopAgent: bounded iteration over a list of sub-agents
//!
//! Each iteration runs every sub-agent in order on the shared context. The
//! loop ends when a sub-agent's tool escalates (the current sub-agent's turn
//! finishes and the rest of the iteration is skipped), when the optional
//! continuation condition on shared state returns `false`, or after
//! `max_iterations` full iterations. The condition is checked before the first
//! iteration and after every full iteration.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;

use super::types::{Agent, AgentContext, AgentEvent, AgentEventStream, LoopExit};
use crate::utils::error::{AppError, AppResult};

/// Type alias for the loop condition function.
///
/// Takes a reference to the shared state map and returns a `bool`:
/// - `true` means continue looping
/// - `false` means stop looping
pub type LoopConditionFn = Box<dyn Fn(&HashMap<String, Value>) -> bool + Send + Sync>;

/// Default maximum number of loop iterations.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Why a loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExitReason {
    /// A sub-agent's tool declared `escalate`.
    Escalated,
    /// The continuation condition returned `false`.
    ConditionMet,
    /// `max_iterations` full iterations ran.
    MaxIterations,
}

/// A composite agent that repeatedly executes its sub-agents.
pub struct LoopAgent {
    /// Display name for this composite agent.
    name: String,
    /// Description of this composite agent.
    description: String,
    /// Sub-agents executed in order on every iteration.
    agents: Vec<Arc<dyn Agent>>,
    /// Condition function stored in Arc so it can be shared with the unfold closure.
    condition: Option<Arc<LoopConditionFn>>,
    /// Maximum number of iterations before forced termination.
    max_iterations: u32,
}

impl LoopAgent {
    /// Create a new LoopAgent over the given sub-agents.
    pub fn new(name: impl Into<String>, agents: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            name: name.into(),
            description: "Repeatedly executes sub-agents until escalation, a condition or the iteration cap"
                .to_string(),
            agents,
            condition: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Set a custom description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Set the continuation condition.
    pub fn with_condition(mut self, condition: LoopConditionFn) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Sub-agents run on each iteration.
    pub fn sub_agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }
}

#[async_trait]
impl Agent for LoopAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: AgentContext) -> AppResult<AgentEventStream> {
        if self.agents.is_empty() {
            return Err(AppError::validation(format!(
                "LoopAgent '{}' has no sub-agents",
                self.name
            )));
        }

        let mut state = LoopState {
            name: self.name.clone(),
            agents: self.agents.clone(),
            base_ctx: ctx,
            condition: self.condition.clone(),
            max_iterations: self.max_iterations,
            iteration: 0,
            index: 0,
            current_stream: None,
            last_output: None,
            escalated: false,
            finished: false,
        };

        // Check the condition before starting the first iteration
        if self.max_iterations == 0 {
            let done = state.complete(LoopExitReason::MaxIterations);
            return Ok(Box::pin(futures_util::stream::iter(vec![Ok(done)])));
        }
        if !state.should_continue().await {
            let done = state.complete(LoopExitReason::ConditionMet);
            return Ok(Box::pin(futures_util::stream::iter(vec![Ok(done)])));
        }

        let stream = futures_util::stream::unfold(state, |mut state| async move {
            if state.finished {
                return None;
            }

            loop {
                if let Some(ref mut sub_stream) = state.current_stream {
                    let next = sub_stream.next().await;
                    match next {
                        Some(Ok(AgentEvent::Done { output })) => {
                            if output.is_some() {
                                state.last_output = output;
                            }
                            if let Some(done) = state.finish_sub_agent().await {
                                return Some((Ok(done), state));
                            }
                            continue;
                        }
                        Some(Ok(event)) => {
                            if event.is_escalation() {
                                state.escalated = true;
                            }
                            return Some((Ok(event), state));
                        }
                        Some(Err(e)) => {
                            state.finished = true;
                            return Some((Err(e), state));
                        }
                        None => {
                            // Stream ended without a Done event
                            if let Some(done) = state.finish_sub_agent().await {
                                return Some((Ok(done), state));
                            }
                            continue;
                        }
                    }
                }

                let agent = state.agents[state.index].clone();
                let started = match state.base_ctx.ensure_not_cancelled(&state.name) {
                    Ok(()) => agent.run(state.base_ctx.clone()).await,
                    Err(e) => Err(e),
                };
                match started {
                    Ok(stream) => {
                        tracing::debug!(
                            loop_agent = %state.name,
                            iteration = state.iteration + 1,
                            agent = agent.name(),
                            "starting sub-agent"
                        );
                        state.current_stream = Some(stream);
                    }
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

/// Internal state for the loop unfold stream.
struct LoopState {
    name: String,
    agents: Vec<Arc<dyn Agent>>,
    base_ctx: AgentContext,
    condition: Option<Arc<LoopConditionFn>>,
    max_iterations: u32,
    /// Completed full iterations.
    iteration: u32,
    /// Sub-agent currently running within the iteration.
    index: usize,
    current_stream: Option<AgentEventStream>,
    last_output: Option<String>,
    escalated: bool,
    /// Set to true after emitting the final Done event, so the unfold
    /// terminates on the next call.
    finished: bool,
}

impl LoopState {
    /// Evaluate the continuation condition against shared state.
    ///
    /// Only the condition and the state handle are moved into the future;
    /// the running sub-agent stream stays out of it.
    fn should_continue(&self) -> impl std::future::Future<Output = bool> + Send + 'static {
        let condition = self.condition.clone();
        let shared_state = self.base_ctx.shared_state.clone();
        async move {
            match condition {
                Some(condition) => {
                    let state = shared_state.read().await;
                    condition(&state)
                }
                None => true,
            }
        }
    }

    /// Advance past the sub-agent that just finished. Returns the final
    /// `Done` when the loop is over.
    async fn finish_sub_agent(&mut self) -> Option<AgentEvent> {
        self.current_stream = None;
        if self.escalated {
            return Some(self.complete(LoopExitReason::Escalated));
        }

        self.index += 1;
        if self.index < self.agents.len() {
            return None;
        }

        self.index = 0;
        self.iteration += 1;
        if self.iteration >= self.max_iterations {
            return Some(self.complete(LoopExitReason::MaxIterations));
        }
        if !self.should_continue().await {
            return Some(self.complete(LoopExitReason::ConditionMet));
        }
        None
    }

    fn complete(&mut self, reason: LoopExitReason) -> AgentEvent {
        self.finished = true;
        tracing::info!(
            loop_agent = %self.name,
            iterations = self.iteration,
            reason = ?reason,
            "loop finished"
        );
        AgentEvent::Done {
            output: self.last_output.clone(),
        }
    }
}

/// Construct a condition function from a `condition_key` for pipeline definitions.
///
/// The condition reads the given key from shared state:
/// - If the key is absent, the loop continues (`true`), so the first
///   iteration runs before the sub-agent has set the key.
/// - If the key is present and its value is truthy, the loop continues.
/// - If the key is present and its value is falsy (`false`, `0`, `""`, `null`,
///   empty array, empty object), the loop stops.
pub fn build_loop_condition(condition_key: String) -> LoopConditionFn {
    Box::new(
        move |state: &HashMap<String, Value>| match state.get(&condition_key) {
            None => true,
            Some(value) => is_truthy(value),
        },
    )
}

/// Keep looping until `key` holds exactly `sentinel` (surrounding whitespace
/// ignored). Non-string values never match.
pub fn until_state_equals(key: impl Into<String>, sentinel: impl Into<String>) -> LoopConditionFn {
    let key = key.into();
    let sentinel = sentinel.into();
    Box::new(move |state: &HashMap<String, Value>| {
        state
            .get(&key)
            .and_then(Value::as_str)
            .map_or(true, |v| v.trim() != sentinel)
    })
}

/// Build the condition for a serializable `LoopExit`.
pub fn condition_for(exit: &LoopExit) -> LoopConditionFn {
    match exit {
        LoopExit::WhileTruthy { key } => build_loop_condition(key.clone()),
        LoopExit::UntilEquals { key, value } => until_state_equals(key.clone(), value.clone()),
    }
}

/// Determine if a JSON value is "truthy".
///
/// Falsy values: `null`, `false`, `0`, `""`, empty array, empty object.
/// Everything else is truthy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i != 0
            } else if let Some(f) = n.as_f64() {
                f != 0.0
            } else {
                true
            }
        }
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
