//! SequentialAgent: runs sub-agents in order on one shared context
//!
//! Every sub-agent receives the same input and the same shared state; data
//! flows between steps through output keys and instruction placeholders.
//! All sub-agent events are forwarded; only the final `Done` is emitted.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;

use super::types::{Agent, AgentContext, AgentEvent, AgentEventStream};
use crate::utils::error::{AppError, AppResult};

/// A composite agent that runs sub-agents sequentially.
///
/// The final `Done` carries the output of the last sub-agent that produced
/// one. The first error ends the run.
pub struct SequentialAgent {
    /// Display name for this composite agent.
    name: String,
    /// Description of this composite agent.
    description: String,
    /// Ordered list of sub-agents to run.
    agents: Vec<Arc<dyn Agent>>,
}

impl SequentialAgent {
    /// Create a new SequentialAgent with the given name and sub-agents.
    pub fn new(name: impl Into<String>, agents: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            name: name.into(),
            description: "Runs sub-agents sequentially".to_string(),
            agents,
        }
    }

    /// Set a custom description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Sub-agents in execution order.
    pub fn sub_agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }
}

#[async_trait]
impl Agent for SequentialAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: AgentContext) -> AppResult<AgentEventStream> {
        if self.agents.is_empty() {
            return Err(AppError::validation(format!(
                "SequentialAgent '{}' has no sub-agents",
                self.name
            )));
        }

        let stream = futures_util::stream::unfold(
            SequentialState::new(self.name.clone(), self.agents.clone(), ctx),
            |mut state| async move {
                if state.finished {
                    return None;
                }

                loop {
                    if let Some(ref mut sub_stream) = state.current_stream {
                        match sub_stream.next().await {
                            Some(Ok(AgentEvent::Done { output })) => {
                                if output.is_some() {
                                    state.last_output = output;
                                }
                                state.current_stream = None;
                                state.current_index += 1;

                                if state.current_index >= state.agents.len() {
                                    return Some((Ok(state.complete()), state));
                                }
                                continue;
                            }
                            Some(Ok(event)) => return Some((Ok(event), state)),
                            Some(Err(e)) => {
                                state.finished = true;
                                return Some((Err(e), state));
                            }
                            None => {
                                // Stream ended without Done; move to next
                                state.current_stream = None;
                                state.current_index += 1;

                                if state.current_index >= state.agents.len() {
                                    return Some((Ok(state.complete()), state));
                                }
                                continue;
                            }
                        }
                    }

                    let agent = state.agents[state.current_index].clone();
                    let started = match state.base_ctx.ensure_not_cancelled(&state.name) {
                        Ok(()) => agent.run(state.base_ctx.clone()).await,
                        Err(e) => Err(e),
                    };
                    match started {
                        Ok(stream) => {
                            tracing::debug!(
                                sequence = %state.name,
                                step = state.current_index,
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
            },
        );

        Ok(Box::pin(stream))
    }
}

/// Internal state for the sequential unfold stream.
struct SequentialState {
    name: String,
    agents: Vec<Arc<dyn Agent>>,
    base_ctx: AgentContext,
    current_index: usize,
    current_stream: Option<AgentEventStream>,
    last_output: Option<String>,
    finished: bool,
}

impl SequentialState {
    fn new(name: String, agents: Vec<Arc<dyn Agent>>, ctx: AgentContext) -> Self {
        Self {
            name,
            agents,
            base_ctx: ctx,
            current_index: 0,
            current_stream: None,
            last_output: None,
            finished: false,
        }
    }

    fn complete(&mut self) -> AgentEvent {
        self.finished = true;
        AgentEvent::Done {
            output: self.last_output.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::agent_composer::test_support::*;
    use serde_json::json;

    /// Fails when started.
    struct BrokenAgent;

    #[async_trait]
    impl Agent for BrokenAgent {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        async fn run(&self, _ctx: AgentContext) -> AppResult<AgentEventStream> {
            Err(AppError::internal("boom"))
        }
    }

    #[tokio::test]
    async fn test_sequential_agent_runs_in_order_on_shared_state() {
        let agent1 = Arc::new(MockAgent::writing("agent-1", "a", "A")) as Arc<dyn Agent>;
        let agent2 = Arc::new(MockAgent::writing("agent-2", "b", "B")) as Arc<dyn Agent>;

        let seq = SequentialAgent::new("seq", vec![agent1, agent2]);
        let ctx = mock_context();
        let state = ctx.shared_state.clone();

        let events = collect_ok(seq.run(ctx).await.unwrap()).await;

        assert_eq!(started_agents(&events), vec!["agent-1", "agent-2"]);
        // state keys are forwarded unprefixed
        assert!(events.contains(&AgentEvent::StateUpdate {
            key: "a".into(),
            value: json!("A")
        }));
        let done: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, AgentEvent::Done { .. }))
            .collect();
        assert_eq!(done.len(), 1);
        assert_eq!(
            events.last(),
            Some(&AgentEvent::Done {
                output: Some("B".into())
            })
        );

        let state = state.read().await;
        assert_eq!(state.get("a"), Some(&json!("A")));
        assert_eq!(state.get("b"), Some(&json!("B")));
    }

    #[tokio::test]
    async fn test_sequential_agent_empty_returns_error() {
        let seq = SequentialAgent::new("empty-seq", vec![]);
        let result = seq.run(mock_context()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_sequential_agent_stops_at_first_error() {
        let agents: Vec<Arc<dyn Agent>> = vec![
            Arc::new(MockAgent::new("first", "1")),
            Arc::new(BrokenAgent),
            Arc::new(MockAgent::new("never", "3")),
        ];
        let seq = SequentialAgent::new("seq", agents);
        let mut stream = seq.run(mock_context()).await.unwrap();

        let mut ok = vec![];
        let mut errors = 0;
        while let Some(item) = stream.next().await {
            match item {
                Ok(e) => ok.push(e),
                Err(_) => errors += 1,
            }
        }
        assert_eq!(errors, 1);
        assert_eq!(started_agents(&ok), vec!["first"]);
        assert!(!ok.iter().any(|e| matches!(e, AgentEvent::Done { .. })));
    }

    #[tokio::test]
    async fn test_sequential_agent_respects_cancellation() {
        let seq = SequentialAgent::new(
            "seq",
            vec![Arc::new(MockAgent::new("first", "1")) as Arc<dyn Agent>],
        );
        let ctx = mock_context();
        ctx.cancel.cancel();
        let mut stream = seq.run(ctx).await.unwrap();
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(AppError::Cancelled(_))));
        assert!(stream.next().await.is_none());
    }
}
