//! Shared fixtures for the composer's unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;

use proposal_forge_llm::{
    LlmProvider, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig,
    ToolCall, ToolDefinition,
};

use super::types::{Agent, AgentContext, AgentEvent, AgentEventStream, AgentInput};
use crate::utils::error::AppResult;

/// One recorded provider call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
    pub options: LlmRequestOptions,
}

/// Provider that replays queued responses in order and records every call.
pub struct ScriptedProvider {
    config: ProviderConfig,
    responses: Mutex<VecDeque<LlmResult<LlmResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<LlmResult<LlmResponse>>) -> Arc<Self> {
        Arc::new(Self {
            config: ProviderConfig::default(),
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn supports_native_search(&self) -> bool {
        true
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
        options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            system,
            messages,
            tools: tools.into_iter().map(|t| t.name).collect(),
            options,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(LlmResponse::text("(script exhausted)", "scripted-model")))
    }

    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// A response that asks for one tool call.
pub fn tool_call_response(name: &str, id: &str) -> LlmResult<LlmResponse> {
    let mut response = LlmResponse::text("", "scripted-model");
    response.content = None;
    response.tool_calls = vec![ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: serde_json::json!({}),
    }];
    response.stop_reason = proposal_forge_llm::StopReason::ToolUse;
    Ok(response)
}

/// Context over a scripted provider with the given input.
pub fn context_with(provider: Arc<dyn LlmProvider>, input: &str) -> AgentContext {
    AgentContext::new("test-session", provider, AgentInput::Text(input.to_string()))
}

/// Context whose provider must never be called.
pub fn mock_context() -> AgentContext {
    context_with(ScriptedProvider::new(vec![]), "initial")
}

/// Emits a TextDelta, writes `output` under `key` (when set), then Done.
pub struct MockAgent {
    name: String,
    output: String,
    key: Option<String>,
}

impl MockAgent {
    pub fn new(name: &str, output: &str) -> Self {
        Self {
            name: name.to_string(),
            output: output.to_string(),
            key: None,
        }
    }

    pub fn writing(name: &str, key: &str, output: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            ..Self::new(name, output)
        }
    }
}

#[async_trait]
impl Agent for MockAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Mock agent for testing"
    }

    async fn run(&self, ctx: AgentContext) -> AppResult<AgentEventStream> {
        let mut events = vec![
            Ok(AgentEvent::Started {
                agent: self.name.clone(),
            }),
            Ok(AgentEvent::TextDelta {
                content: self.output.clone(),
            }),
        ];
        if let Some(key) = &self.key {
            let value = serde_json::json!(self.output);
            ctx.shared_state
                .write()
                .await
                .insert(key.clone(), value.clone());
            events.push(Ok(AgentEvent::StateUpdate {
                key: key.clone(),
                value,
            }));
        }
        events.push(Ok(AgentEvent::Done {
            output: Some(self.output.clone()),
        }));
        Ok(Box::pin(futures_util::stream::iter(events)))
    }
}

/// Drain a stream, failing the test on the first error.
pub async fn collect_ok(mut stream: AgentEventStream) -> Vec<AgentEvent> {
    let mut events = vec![];
    while let Some(event) = stream.next().await {
        events.push(event.unwrap());
    }
    events
}

/// Names from `Started` events, in order.
pub fn started_agents(events: &[AgentEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::Started { agent } => Some(agent.clone()),
            _ => None,
        })
        .collect()
}
