//! Execution Context
//!
//! Two levels of context:
//!
//! 1. `ExecutionContext` trait - immutable session information shared by all scopes
//! 2. `ToolContext` - what a tool sees while it runs
//!
//! Tools only see `ToolContext`: a read-only snapshot of session state plus
//! identifiers. They cannot mutate state directly; they declare changes via
//! `EventActions` in their `ToolOutput`.

use serde_json::Value;

use crate::state::StateMap;

/// Base execution context trait providing immutable session information.
pub trait ExecutionContext: Send + Sync {
    /// Returns the unique session identifier for this execution.
    fn session_id(&self) -> &str;

    /// Returns the identifier of the current invocation (one runner call).
    fn invocation_id(&self) -> &str;

    /// Returns the name of the currently executing agent.
    fn agent_name(&self) -> &str;
}

/// Context for tool-level execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    session_id: String,
    invocation_id: String,
    agent_name: String,
    /// Unique identifier for this specific tool call.
    tool_call_id: String,
    /// Session state as it was when the tool was invoked.
    state: StateMap,
}

impl ToolContext {
    /// Create a new ToolContext.
    pub fn new(
        session_id: impl Into<String>,
        invocation_id: impl Into<String>,
        agent_name: impl Into<String>,
        tool_call_id: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            invocation_id: invocation_id.into(),
            agent_name: agent_name.into(),
            tool_call_id: tool_call_id.into(),
            state: StateMap::new(),
        }
    }

    /// Attach a state snapshot.
    pub fn with_state(mut self, state: StateMap) -> Self {
        self.state = state;
        self
    }

    /// Returns the unique tool call identifier.
    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    /// Read a state value.
    pub fn state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Read a state value as a string slice.
    pub fn state_str(&self, key: &str) -> Option<&str> {
        self.state.get(key).and_then(Value::as_str)
    }
}

impl ExecutionContext for ToolContext {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    fn agent_name(&self) -> &str {
        &self.agent_name
    }
}
