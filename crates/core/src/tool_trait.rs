//! Unified Tool Trait
//!
//! Tool abstraction with split definition/execution traits:
//!
//! - `ToolDefinitionTrait` - Identity, schema, native capability
//! - `ToolExecutable` - Execution capability
//! - `UnifiedTool` - Combined trait (auto-implemented via blanket impl)
//! - `UnifiedToolRegistry` - O(1) lookup registry with ordered iteration
//!
//! Two kinds of tools share these traits. Function tools run locally and
//! are advertised to the model as function declarations. Native tools (the
//! hosted web search) are executed by the LLM provider itself; they only
//! flip a request flag and are never executed locally.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ToolContext;
use crate::error::{CoreError, CoreResult};
use crate::event_actions::EventActions;

// ============================================================================
// Trait Definitions
// ============================================================================

/// Capabilities that a hosted model provides on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeCapability {
    /// Provider-side web search with grounded citations.
    WebSearch,
}

/// Result of a tool execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// The tool's output, sent back to the model.
    pub value: Value,
    /// Side effects the tool asks the caller to apply.
    pub actions: EventActions,
}

impl ToolOutput {
    /// Output with no side effects.
    pub fn value(value: Value) -> Self {
        Self {
            value,
            actions: EventActions::none(),
        }
    }

    /// Attach declared actions.
    pub fn with_actions(mut self, actions: EventActions) -> Self {
        self.actions = actions;
        self
    }
}

/// Tool definition metadata trait.
pub trait ToolDefinitionTrait: Send + Sync {
    /// Unique name of this tool (e.g., "google_search", "exit_proposal_loop").
    fn name(&self) -> &str;

    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema describing input parameters.
    ///
    /// ```json
    /// {
    ///   "type": "object",
    ///   "properties": {
    ///     "query": { "type": "string", "description": "Search query" }
    ///   },
    ///   "required": ["query"]
    /// }
    /// ```
    fn parameters_schema(&self) -> Value;

    /// Provider-side capability this tool stands for, if any.
    fn native_capability(&self) -> Option<NativeCapability> {
        None
    }
}

/// Tool execution trait.
#[async_trait]
pub trait ToolExecutable: Send + Sync {
    /// Execute the tool with the given context and arguments.
    ///
    /// # Arguments
    /// - `ctx` - The tool execution context (session info, state snapshot)
    /// - `args` - JSON arguments matching the tool's `parameters_schema()`
    async fn execute(&self, ctx: &ToolContext, args: Value) -> CoreResult<ToolOutput>;
}

/// Combined trait for tools that provide both definition and execution.
pub trait UnifiedTool: ToolDefinitionTrait + ToolExecutable {}

impl<T: ToolDefinitionTrait + ToolExecutable> UnifiedTool for T {}

// ============================================================================
// UnifiedToolRegistry
// ============================================================================

/// Registry for `UnifiedTool` implementations.
///
/// Provides O(1) lookup by name and registration-order iteration.
#[derive(Clone)]
pub struct UnifiedToolRegistry {
    tools: HashMap<String, Arc<dyn UnifiedTool>>,
    /// Insertion order for deterministic iteration.
    order: Vec<String>,
}

impl UnifiedToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn UnifiedTool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn UnifiedTool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn UnifiedTool>> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Native capabilities requested by the registered tools.
    pub fn native_capabilities(&self) -> Vec<NativeCapability> {
        let mut caps = Vec::new();
        for cap in self.iter().filter_map(|t| t.native_capability()) {
            if !caps.contains(&cap) {
                caps.push(cap);
            }
        }
        caps
    }

    /// Execute a tool by name.
    ///
    /// Returns `Err(CoreError::NotFound)` if the tool is not registered and
    /// `Err(CoreError::Tool)` for native tools, which only the provider runs.
    pub async fn execute(
        &self,
        name: &str,
        ctx: &ToolContext,
        args: Value,
    ) -> CoreResult<ToolOutput> {
        match self.tools.get(name) {
            Some(tool) if tool.native_capability().is_some() => Err(CoreError::tool(format!(
                "{} is executed by the model provider",
                name
            ))),
            Some(tool) => tool.execute(ctx, args).await,
            None => Err(CoreError::not_found(format!("Tool not found: {}", name))),
        }
    }
}

impl Default for UnifiedToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UnifiedToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiedToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
