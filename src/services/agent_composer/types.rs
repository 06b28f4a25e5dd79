//! Core types for the Composable Agent Model
//!
//! Defines the Agent trait, AgentContext, AgentEvent, AgentInput, AgentConfig,
//! AgentPipeline, and AgentStep types that form the foundation of the
//! composable agent architecture.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use proposal_forge_core::{EventActions, StateMap};
use proposal_forge_llm::LlmProvider;

use crate::utils::error::{AppError, AppResult};

// ============================================================================
// Agent Event Stream
// ============================================================================

/// Type alias for the asynchronous stream of agent events.
///
/// Each item is a `Result<AgentEvent, AppError>`, enabling the consumer to
/// handle both events and errors as they arrive from the agent.
pub type AgentEventStream = Pin<Box<dyn Stream<Item = AppResult<AgentEvent>> + Send>>;

/// Shared session state handle passed between agents.
pub type SharedState = Arc<RwLock<HashMap<String, Value>>>;

// ============================================================================
// Agent Trait
// ============================================================================

/// Core trait for composable agents.
///
/// Agents are lightweight, composable execution units. Each agent takes an
/// `AgentContext` and returns an asynchronous stream of `AgentEvent`s. Agents
/// can be composed into pipelines using `SequentialAgent`, `ParallelAgent`,
/// and `LoopAgent`.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the agent's unique name.
    fn name(&self) -> &str;

    /// Returns a human-readable description of the agent.
    fn description(&self) -> &str;

    /// Execute the agent with the given context, returning a stream of events.
    ///
    /// The returned stream will emit events as the agent progresses, ending
    /// with a `Done` event on successful completion.
    async fn run(&self, ctx: AgentContext) -> AppResult<AgentEventStream>;
}

// ============================================================================
// Agent Context
// ============================================================================

/// Context provided to an agent during execution.
///
/// Contains all the dependencies an agent needs: the LLM provider, input
/// data, shared state, configuration and the run's cancellation token.
#[derive(Clone)]
pub struct AgentContext {
    /// Unique session identifier for this execution.
    pub session_id: String,
    /// Identifier of the runner invocation this agent belongs to.
    pub invocation_id: String,
    /// LLM provider for model interactions.
    pub provider: Arc<dyn LlmProvider>,
    /// Input data for this agent invocation.
    pub input: AgentInput,
    /// Shared state accessible by all agents in a pipeline.
    ///
    /// Agents read it through `{key}` placeholders in their instructions and
    /// write their final text under their output key.
    pub shared_state: SharedState,
    /// Agent-specific configuration.
    pub config: AgentConfig,
    /// Cancelled when the caller abandons the run.
    pub cancel: CancellationToken,
}

impl AgentContext {
    /// Create a context with a fresh state map and invocation id.
    pub fn new(
        session_id: impl Into<String>,
        provider: Arc<dyn LlmProvider>,
        input: AgentInput,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            invocation_id: format!("inv-{}", uuid::Uuid::new_v4()),
            provider,
            input,
            shared_state: Arc::new(RwLock::new(HashMap::new())),
            config: AgentConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an existing state handle.
    pub fn with_shared_state(mut self, state: SharedState) -> Self {
        self.shared_state = state;
        self
    }

    /// Set the agent configuration.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Clone of the current shared state.
    pub async fn state_snapshot(&self) -> StateMap {
        self.shared_state.read().await.clone()
    }

    /// Fail fast when the run has been cancelled.
    pub fn ensure_not_cancelled(&self, agent: &str) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            Err(AppError::cancelled(format!("{} was cancelled", agent)))
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Agent Input
// ============================================================================

/// Input data for an agent invocation.
///
/// Supports multiple input formats to accommodate different use cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AgentInput {
    /// Plain text input (most common).
    Text(String),
    /// Structured JSON input for complex data.
    Structured(Value),
}

impl Default for AgentInput {
    fn default() -> Self {
        AgentInput::Text(String::new())
    }
}

impl AgentInput {
    /// Extract the input as a text string.
    ///
    /// For `Text`, returns the string directly.
    /// For `Structured`, returns the JSON serialization.
    pub fn as_text(&self) -> String {
        match self {
            AgentInput::Text(s) => s.clone(),
            AgentInput::Structured(v) => serde_json::to_string_pretty(v).unwrap_or_default(),
        }
    }
}

// ============================================================================
// Agent Event
// ============================================================================

/// Events emitted by agents during execution.
///
/// Composite agents (Sequential, Parallel, Loop) forward sub-agent events
/// unchanged and replace the sub-agents' `Done` events with their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// An LLM agent started its turn.
    Started { agent: String },
    /// Text content from the model.
    TextDelta { content: String },
    /// The model requested a tool call.
    ToolCall {
        name: String,
        args: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Result of a tool call.
    ToolResult {
        name: String,
        result: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// A key was written to shared state.
    StateUpdate { key: String, value: Value },
    /// Declared side effects from a tool.
    ///
    /// `LoopAgent` stops iterating when it sees `escalate`; every other
    /// composite forwards the event unchanged.
    Actions { actions: EventActions },
    /// Token usage of one model call.
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
    /// Agent execution completed successfully with optional output.
    Done { output: Option<String> },
}

impl AgentEvent {
    /// Whether this event asks an enclosing loop to stop.
    pub fn is_escalation(&self) -> bool {
        matches!(self, AgentEvent::Actions { actions } if actions.escalate)
    }
}

// ============================================================================
// Agent Config
// ============================================================================

/// Configuration options for agent execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of model calls in one LLM agent turn
    /// (tool round trips included).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// LLM temperature setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

fn default_max_iterations() -> u32 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            temperature: None,
        }
    }
}

// ============================================================================
// Agent Pipeline (Serializable definitions)
// ============================================================================

/// Serializable definition of an agent pipeline.
///
/// Pipelines describe compositions of agents that can be written to JSON or
/// TOML and reconstructed at runtime by the `ComposerRegistry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPipeline {
    /// Unique pipeline identifier.
    pub pipeline_id: String,
    /// Human-readable pipeline name (also the root agent's name).
    pub name: String,
    /// Optional description of what this pipeline does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered list of agent steps in this pipeline.
    pub steps: Vec<AgentStep>,
    /// When the pipeline was created (RFC 3339).
    pub created_at: String,
    /// When the pipeline was last updated (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl AgentPipeline {
    /// Names of every LLM step, depth first.
    pub fn llm_step_names(&self) -> Vec<&str> {
        fn walk<'a>(step: &'a AgentStep, out: &mut Vec<&'a str>) {
            match step {
                AgentStep::LlmStep(cfg) => out.push(&cfg.name),
                AgentStep::SequentialStep { steps, .. }
                | AgentStep::ParallelStep { steps, .. }
                | AgentStep::LoopStep { steps, .. } => {
                    for s in steps {
                        walk(s, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        for step in &self.steps {
            walk(step, &mut out);
        }
        out
    }
}

/// A single step in an agent pipeline.
///
/// Each variant corresponds to a different agent type, with its own
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step_type", rename_all = "snake_case")]
pub enum AgentStep {
    /// An LLM-backed agent step.
    LlmStep(LlmStepConfig),
    /// A sequential composition of sub-steps.
    SequentialStep { name: String, steps: Vec<AgentStep> },
    /// A parallel composition of sub-steps.
    ParallelStep { name: String, steps: Vec<AgentStep> },
    /// Runs its sub-steps in order, repeatedly, until an exit condition holds.
    LoopStep {
        name: String,
        /// Sub-steps executed in order on every iteration.
        steps: Vec<AgentStep>,
        /// Maximum number of full iterations before forced termination.
        #[serde(default = "default_loop_max_iterations")]
        max_iterations: u32,
        /// Optional state-based exit condition. Tool escalation always ends
        /// the loop as well.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit: Option<LoopExit>,
    },
}

impl AgentStep {
    /// Name of the agent this step builds.
    pub fn name(&self) -> &str {
        match self {
            AgentStep::LlmStep(cfg) => &cfg.name,
            AgentStep::SequentialStep { name, .. }
            | AgentStep::ParallelStep { name, .. }
            | AgentStep::LoopStep { name, .. } => name,
        }
    }
}

fn default_loop_max_iterations() -> u32 {
    3
}

/// State-based exit condition of a `LoopStep`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoopExit {
    /// Keep looping while the key is absent or truthy.
    WhileTruthy { key: String },
    /// Stop once the key's trimmed string value equals `value`.
    UntilEquals { key: String, value: String },
}

/// Configuration for an LLM agent step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmStepConfig {
    /// Agent name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional system instruction with `{key}` state placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    /// Optional model override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Names of the catalog tools this agent may use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    /// State key that receives the agent's final text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
    /// Agent-specific configuration. When absent the agent uses the
    /// configuration of the context it runs in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<AgentConfig>,
}

impl LlmStepConfig {
    /// A step with only a name; everything else defaulted.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            instruction: None,
            model: None,
            tools: None,
            output_key: None,
            config: None,
        }
    }
}
