//! Proposal Forge Core
//!
//! Foundational types for the Proposal Forge workspace. This crate has no
//! dependency on LLM providers, the async runtime or the agent composer.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `state` - Session state keys and scopes (`StateKey`, `StateScope`)
//! - `instruction` - `{key}` placeholder injection for agent instructions
//! - `event_actions` - Declared side effects (`EventActions`)
//! - `context` - Execution context (`ExecutionContext`, `ToolContext`)
//! - `tool_trait` - Tool abstraction (`ToolDefinitionTrait`, `ToolExecutable`, `UnifiedTool`, `UnifiedToolRegistry`)

pub mod context;
pub mod error;
pub mod event_actions;
pub mod instruction;
pub mod state;
pub mod tool_trait;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Context ────────────────────────────────────────────────────────────
pub use context::{ExecutionContext, ToolContext};

// ── Session State ──────────────────────────────────────────────────────
pub use instruction::inject_state;
pub use state::{StateKey, StateMap, StateScope};

// ── Event Actions ──────────────────────────────────────────────────────
pub use event_actions::EventActions;

// ── Unified Tool Trait ─────────────────────────────────────────────────
pub use tool_trait::{
    NativeCapability, ToolDefinitionTrait, ToolExecutable, ToolOutput, UnifiedTool,
    UnifiedToolRegistry,
};
