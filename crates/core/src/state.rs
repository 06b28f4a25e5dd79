//! Session State Keys & Scopes
//!
//! Session state is a flat map from string keys to JSON values. The key's
//! prefix decides how long a value lives:
//!
//! - `app:` - shared by every session of the application
//! - `user:` - shared by every session of the same user
//! - `temp:` - dropped when the invocation that wrote it finishes
//! - no prefix - lives with the session
//!
//! Agents write their outputs under plain session keys (`winning_projects`,
//! `research_proposal`, ...). The session service uses the scope helpers
//! here to route app/user values to their shared stores.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Prefix for application-wide state.
pub const APP_PREFIX: &str = "app:";
/// Prefix for user-wide state.
pub const USER_PREFIX: &str = "user:";
/// Prefix for invocation-local state.
pub const TEMP_PREFIX: &str = "temp:";

/// Flat session state map.
pub type StateMap = HashMap<String, Value>;

/// Lifetime of a state entry, derived from its key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateScope {
    Session,
    App,
    User,
    Temp,
}

impl StateScope {
    /// Classify a raw key by its prefix.
    pub fn of(key: &str) -> Self {
        if key.starts_with(APP_PREFIX) {
            StateScope::App
        } else if key.starts_with(USER_PREFIX) {
            StateScope::User
        } else if key.starts_with(TEMP_PREFIX) {
            StateScope::Temp
        } else {
            StateScope::Session
        }
    }

    /// The key prefix for this scope (empty for session scope).
    pub fn prefix(&self) -> &'static str {
        match self {
            StateScope::Session => "",
            StateScope::App => APP_PREFIX,
            StateScope::User => USER_PREFIX,
            StateScope::Temp => TEMP_PREFIX,
        }
    }
}

/// Validated session state key.
///
/// # Examples
/// ```ignore
/// let key = StateKey::new("research_proposal")?;
/// let key = StateKey::new("user:preferred_competition")?;
/// let key = StateKey::new("temp:last_search_query")?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey(String);

impl StateKey {
    /// Validate and create a state key.
    ///
    /// Keys must be non-empty and a prefixed key must carry a name after
    /// its prefix.
    pub fn new(key: impl Into<String>) -> CoreResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(CoreError::validation("State key cannot be empty"));
        }
        let scope = StateScope::of(&key);
        if key.len() == scope.prefix().len() {
            return Err(CoreError::validation(format!(
                "State key must have a name after the prefix. Got: '{}'",
                key
            )));
        }
        Ok(Self(key))
    }

    /// Create a key in the given scope.
    pub fn scoped(scope: StateScope, name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::validation("Key name cannot be empty"));
        }
        Self::new(format!("{}{}", scope.prefix(), name))
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scope of this key.
    pub fn scope(&self) -> StateScope {
        StateScope::of(&self.0)
    }

    /// Get the name part (after the prefix).
    pub fn name(&self) -> &str {
        &self.0[self.scope().prefix().len()..]
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State entries grouped by scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopedState {
    pub session: StateMap,
    pub app: StateMap,
    pub user: StateMap,
    pub temp: StateMap,
}

/// Split a flat state map into its scopes.
pub fn split_by_scope(state: &StateMap) -> ScopedState {
    let mut scoped = ScopedState::default();
    for (key, value) in state {
        let bucket = match StateScope::of(key) {
            StateScope::Session => &mut scoped.session,
            StateScope::App => &mut scoped.app,
            StateScope::User => &mut scoped.user,
            StateScope::Temp => &mut scoped.temp,
        };
        bucket.insert(key.clone(), value.clone());
    }
    scoped
}

/// Remove every `temp:` entry, returning how many were dropped.
pub fn strip_temp(state: &mut StateMap) -> usize {
    let before = state.len();
    state.retain(|k, _| StateScope::of(k) != StateScope::Temp);
    before - state.len()
}
