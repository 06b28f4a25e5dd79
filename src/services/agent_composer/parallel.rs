//! ParallelAgent: runs sub-agents concurrently, merging event streams
//!
//! All sub-agents are started up front and their event streams are merged
//! using `futures_util::stream::SelectAll`. Sub-agents share the context's
//! state handle, so each one should write a distinct output key.
//!
//! The ParallelAgent completes when ALL sub-agents have emitted a `Done` event.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::SelectAll;
use futures_util::StreamExt;

use super::types::{Agent, AgentContext, AgentEvent, AgentEventStream};
use crate::utils::error::{AppError, AppResult};

/// Separator between sub-agent outputs in the combined `Done`.
pub const OUTPUT_SEPARATOR: &str = "\n\n---\n\n";

/// A composite agent that runs sub-agents concurrently.
///
/// All sub-agents receive the same input. The merged stream ends when all
/// sub-agents have finished, at which point a final `Done` event is emitted
/// with the combined outputs. The first error ends the run.
pub struct ParallelAgent {
    /// Display name for this composite agent.
    name: String,
    /// Description of this composite agent.
    description: String,
    /// Sub-agents to run concurrently.
    agents: Vec<Arc<dyn Agent>>,
}

impl ParallelAgent {
    /// Create a new ParallelAgent with the given name and sub-agents.
    pub fn new(name: impl Into<String>, agents: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            name: name.into(),
            description: "Runs sub-agents concurrently, merging event streams".to_string(),
            agents,
        }
    }

    /// Set a custom description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Sub-agents started by this agent.
    pub fn sub_agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }
}

#[async_trait]
impl Agent for ParallelAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: AgentContext) -> AppResult<AgentEventStream> {
        if self.agents.is_empty() {
            return Err(AppError::validation(format!(
                "ParallelAgent '{}' has no sub-agents",
                self.name
            )));
        }
        ctx.ensure_not_cancelled(&self.name)?;

        let total_agents = self.agents.len();
        let mut merged: SelectAll<AgentEventStream> = SelectAll::new();

        for agent in &self.agents {
            match agent.run(ctx.clone()).await {
                Ok(stream) => merged.push(stream),
                Err(e) => {
                    tracing::error!(parallel = %self.name, agent = agent.name(), error = %e, "failed to start sub-agent");
                    return Err(e);
                }
            }
        }
        tracing::debug!(parallel = %self.name, agents = total_agents, "sub-agents started");

        let stream = futures_util::stream::unfold(
            ParallelState {
                merged,
                done_count: 0,
                total: total_agents,
                outputs: Vec::new(),
                finished: false,
            },
            |mut state| async move {
                if state.finished {
                    return None;
                }

                loop {
                    match state.merged.next().await {
                        Some(Ok(AgentEvent::Done { output })) => {
                            if let Some(out) = output {
                                state.outputs.push(out);
                            }
                            state.done_count += 1;

                            if state.done_count >= state.total {
                                return Some((Ok(state.complete()), state));
                            }
                            // Don't emit intermediate Done events
                            continue;
                        }
                        Some(Ok(event)) => return Some((Ok(event), state)),
                        Some(Err(e)) => {
                            // Dropping the remaining streams closes their channels.
                            state.finished = true;
                            return Some((Err(e), state));
                        }
                        None => {
                            // Some agents ended without Done
                            return Some((Ok(state.complete()), state));
                        }
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}

/// Internal state for the parallel unfold stream.
struct ParallelState {
    merged: SelectAll<AgentEventStream>,
    done_count: usize,
    total: usize,
    outputs: Vec<String>,
    finished: bool,
}

impl ParallelState {
    fn complete(&mut self) -> AgentEvent {
        self.finished = true;
        self.merged = SelectAll::new();
        let combined = if self.outputs.is_empty() {
            None
        } else {
            Some(self.outputs.join(OUTPUT_SEPARATOR))
        };
        AgentEvent::Done { output: combined }
    }
}
