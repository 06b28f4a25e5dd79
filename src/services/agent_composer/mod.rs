//! Composable Agent Model
//!
//! Builds multi-agent pipelines from simple building blocks:
//!
//! - **Agent trait**: Core interface with `name()`, `description()`, and `run()` methods
//! - **LlmAgent**: One model turn with state-templated instructions and tools
//! - **SequentialAgent**: Runs sub-agents in order on shared state
//! - **ParallelAgent**: Runs sub-agents concurrently, merging event streams
//! - **LoopAgent**: Repeats sub-agents until escalation, a condition or a cap
//! - **ComposerRegistry**: Tool catalog and pipeline construction

pub mod llm_agent;
pub mod loop_agent;
pub mod parallel;
pub mod registry;
pub mod sequential;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export core types
pub use types::{
    Agent, AgentConfig, AgentContext, AgentEvent, AgentEventStream, AgentInput, AgentPipeline,
    AgentStep, LlmStepConfig, LoopExit, SharedState,
};
pub use llm_agent::LlmAgent;
pub use loop_agent::{
    build_loop_condition, until_state_equals, LoopAgent, LoopConditionFn, LoopExitReason,
};
pub use parallel::{ParallelAgent, OUTPUT_SEPARATOR};
pub use registry::ComposerRegistry;
pub use sequential::SequentialAgent;
