//! LlmAgent: one model turn with state-templated instructions and tools
//!
//! The agent resolves `{key}` placeholders in its instruction against shared
//! state, calls the provider with the invocation input, executes the function
//! tools the model asks for and finally stores its answer under `output_key`.
//! The turn runs on a spawned task; events reach the caller through an mpsc
//! channel bridge.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use proposal_forge_core::{
    inject_state, EventActions, NativeCapability, ToolContext, ToolDefinitionTrait, UnifiedTool,
    UnifiedToolRegistry,
};
use proposal_forge_llm::{
    LlmRequestOptions, Message, ParameterSchema, ToolCallMode, ToolDefinition,
};

use super::types::{Agent, AgentConfig, AgentContext, AgentEvent, AgentEventStream};
use crate::utils::error::{AppError, AppResult};

/// Channel capacity between the turn task and the event stream.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// An agent backed by a single LLM conversation turn.
#[derive(Clone)]
pub struct LlmAgent {
    /// Display name for this agent.
    name: String,
    /// Description of what this agent does.
    description: String,
    /// System instruction; may reference state as `{key}` or `{key?}`.
    instruction: Option<String>,
    /// Optional model override (uses the provider's model if None).
    model: Option<String>,
    /// Tools this agent may use.
    tools: UnifiedToolRegistry,
    /// State key that receives the final text.
    output_key: Option<String>,
    /// Agent-specific configuration overrides.
    config: Option<AgentConfig>,
}

impl LlmAgent {
    /// Create a new LlmAgent with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: "LLM-backed agent".to_string(),
            instruction: None,
            model: None,
            tools: UnifiedToolRegistry::new(),
            output_key: None,
            config: None,
        }
    }

    /// Set the agent's description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Set the system instruction for the LLM.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Set the model to use (overrides the provider's default model).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add a tool.
    pub fn with_tool(mut self, tool: std::sync::Arc<dyn UnifiedTool>) -> Self {
        self.tools.register(tool);
        self
    }

    /// Replace the tool set.
    pub fn with_tools(mut self, tools: UnifiedToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Store the final text under this state key.
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Set the agent configuration, overriding the context's.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn instruction(&self) -> Option<&str> {
        self.instruction.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }

    pub fn tools(&self) -> &UnifiedToolRegistry {
        &self.tools
    }

    /// Function declarations for the locally executed tools.
    fn tool_definitions(&self) -> AppResult<Vec<ToolDefinition>> {
        self.tools
            .iter()
            .filter(|tool| tool.native_capability().is_none())
            .map(|tool| {
                let input_schema: ParameterSchema =
                    serde_json::from_value(tool.parameters_schema())?;
                Ok(ToolDefinition {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    input_schema,
                })
            })
            .collect()
    }

    /// Run the whole turn, pushing events into `tx`.
    async fn run_turn(&self, ctx: AgentContext, tx: &mpsc::Sender<AppResult<AgentEvent>>) -> AppResult<()> {
        let config = self.config.clone().unwrap_or_else(|| ctx.config.clone());
        emit(tx, AgentEvent::Started {
            agent: self.name.clone(),
        })
        .await?;

        let snapshot = ctx.state_snapshot().await;
        let system = match &self.instruction {
            Some(template) => Some(inject_state(template, &snapshot)?),
            None => None,
        };

        let tools = self.tool_definitions()?;
        let native_search = self
            .tools
            .native_capabilities()
            .contains(&NativeCapability::WebSearch);
        if native_search && !ctx.provider.supports_native_search() {
            tracing::warn!(
                agent = %self.name,
                provider = ctx.provider.name(),
                "provider has no hosted web search; continuing without it"
            );
        }
        let options = LlmRequestOptions {
            tool_call_mode: ToolCallMode::Auto,
            temperature_override: config.temperature,
            model_override: self.model.clone(),
            native_search,
        };

        let mut messages = vec![Message::user(ctx.input.as_text())];
        let mut final_text: Option<String> = None;

        for round in 0..config.max_iterations {
            ctx.ensure_not_cancelled(&self.name)?;
            tracing::debug!(agent = %self.name, round, "calling model");

            let response = tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    return Err(AppError::cancelled(format!("{} was cancelled", self.name)));
                }
                result = ctx.provider.send_message(
                    messages.clone(),
                    system.clone(),
                    tools.clone(),
                    options.clone(),
                ) => result?,
            };

            emit(tx, AgentEvent::Usage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            })
            .await?;
            if !response.search_queries.is_empty() {
                tracing::debug!(
                    agent = %self.name,
                    queries = ?response.search_queries,
                    sources = response.citations.len(),
                    "model ran web search"
                );
            }
            if let Some(text) = response.content.as_ref().filter(|t| !t.is_empty()) {
                emit(tx, AgentEvent::TextDelta {
                    content: text.clone(),
                })
                .await?;
            }

            if !response.has_tool_calls() {
                final_text = Some(response.content.unwrap_or_default());
                break;
            }

            messages.push(Message::assistant_tool_calls(
                response.content.as_deref(),
                &response.tool_calls,
            ));

            let mut round_actions = EventActions::none();
            for call in &response.tool_calls {
                emit(tx, AgentEvent::ToolCall {
                    name: call.name.clone(),
                    args: call.arguments.to_string(),
                    id: Some(call.id.clone()),
                })
                .await?;

                let tool_ctx = ToolContext::new(
                    ctx.session_id.clone(),
                    ctx.invocation_id.clone(),
                    self.name.clone(),
                    call.id.clone(),
                )
                .with_state(ctx.state_snapshot().await);
                let output = self
                    .tools
                    .execute(&call.name, &tool_ctx, call.arguments.clone())
                    .await?;

                let result = match &output.value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                emit(tx, AgentEvent::ToolResult {
                    name: call.name.clone(),
                    result: result.clone(),
                    id: Some(call.id.clone()),
                    is_error: None,
                })
                .await?;
                messages.push(Message::tool_result(call.id.clone(), result, false));

                if output.actions.has_actions() {
                    self.apply_actions(&ctx, tx, &output.actions).await?;
                    round_actions.merge(output.actions);
                }
            }

            if round_actions.escalate {
                tracing::info!(
                    agent = %self.name,
                    state_keys = round_actions.state_delta.len(),
                    "tool escalated; ending turn"
                );
                emit(tx, AgentEvent::Done { output: None }).await?;
                return Ok(());
            }
        }

        let Some(text) = final_text else {
            return Err(AppError::internal(format!(
                "{} did not finish within {} model calls",
                self.name, config.max_iterations
            )));
        };

        if let Some(key) = &self.output_key {
            let value = Value::String(text.clone());
            ctx.shared_state
                .write()
                .await
                .insert(key.clone(), value.clone());
            emit(tx, AgentEvent::StateUpdate {
                key: key.clone(),
                value,
            })
            .await?;
        }

        tracing::info!(agent = %self.name, chars = text.chars().count(), "agent finished");
        emit(tx, AgentEvent::Done { output: Some(text) }).await
    }

    /// Apply a tool's state delta and forward its actions.
    async fn apply_actions(
        &self,
        ctx: &AgentContext,
        tx: &mpsc::Sender<AppResult<AgentEvent>>,
        actions: &EventActions,
    ) -> AppResult<()> {
        if !actions.state_delta.is_empty() {
            let mut state = ctx.shared_state.write().await;
            for (key, value) in &actions.state_delta {
                state.insert(key.clone(), value.clone());
            }
        }
        emit(tx, AgentEvent::Actions {
            actions: actions.clone(),
        })
        .await
    }
}

/// Send an event; a closed channel means the consumer went away.
async fn emit(tx: &mpsc::Sender<AppResult<AgentEvent>>, event: AgentEvent) -> AppResult<()> {
    tx.send(Ok(event))
        .await
        .map_err(|_| AppError::cancelled("event consumer dropped"))
}

#[async_trait]
impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: AgentContext) -> AppResult<AgentEventStream> {
        ctx.ensure_not_cancelled(&self.name)?;
        let (tx, rx) = mpsc::channel::<AppResult<AgentEvent>>(EVENT_CHANNEL_CAPACITY);

        let agent = self.clone();
        tokio::spawn(async move {
            if let Err(e) = agent.run_turn(ctx, &tx).await {
                tracing::error!(agent = %agent.name, error = %e, "agent turn failed");
                let _ = tx.send(Err(e)).await;
            }
        });

        Ok(receiver_stream(rx))
    }
}

/// Create an AgentEventStream from the turn task's receiver.
fn receiver_stream(rx: mpsc::Receiver<AppResult<AgentEvent>>) -> AgentEventStream {
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    Box::pin(stream)
}
