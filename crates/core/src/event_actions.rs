//! Event Actions
//!
//! Side effects declared alongside an event instead of performed directly.
//! Tools return them in `ToolOutput`; the agent that ran the tool applies the
//! state delta and composite agents react to `escalate`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Actions that can be declared alongside an immutable event.
///
/// # Example
///
/// ```ignore
/// let actions = EventActions::none()
///     .with_state("temp:last_query", json!("ISEF 2024 winners"))
///     .with_escalate();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventActions {
    /// Key-value pairs to merge into session state.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub state_delta: HashMap<String, Value>,

    /// Ask the enclosing loop to stop iterating.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub escalate: bool,
}

impl EventActions {
    /// Create empty actions (no side effects).
    pub fn none() -> Self {
        Self::default()
    }

    /// Check if there are any actions to process.
    pub fn has_actions(&self) -> bool {
        !self.state_delta.is_empty() || self.escalate
    }

    /// Builder: add a state delta entry.
    pub fn with_state(mut self, key: impl Into<String>, value: Value) -> Self {
        self.state_delta.insert(key.into(), value);
        self
    }

    /// Builder: request loop escalation.
    pub fn with_escalate(mut self) -> Self {
        self.escalate = true;
        self
    }

    /// Fold another set of actions into this one.
    ///
    /// Later state entries win; escalation is sticky.
    pub fn merge(&mut self, other: EventActions) {
        self.state_delta.extend(other.state_delta);
        self.escalate |= other.escalate;
    }
}
