//! Session Service
//!
//! In-memory sessions for pipeline runs. A session owns the shared state map
//! the agents read and write, plus the events recorded while running. Values
//! under `app:` and `user:` keys outlive the session: `commit_state` copies
//! them to per-app and per-user stores that seed later sessions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use proposal_forge_core::state::{split_by_scope, strip_temp};
use proposal_forge_core::StateMap;

use crate::services::agent_composer::{AgentEvent, SharedState};
use crate::utils::error::{AppError, AppResult};

/// One event as recorded in a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedEvent {
    /// Runner invocation that produced the event.
    pub invocation_id: String,
    pub event: AgentEvent,
    pub timestamp: DateTime<Utc>,
}

/// A conversation between one user and the root agent.
#[derive(Clone)]
pub struct Session {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    /// Live state handle; agents of every run in this session share it.
    pub state: SharedState,
    pub events: Vec<RecordedEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Serializable copy of the session at this moment.
    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            app_name: self.app_name.clone(),
            user_id: self.user_id.clone(),
            state: self.state.read().await.clone(),
            event_count: self.events.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub state: StateMap,
    pub event_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Keeps sessions and the app/user state stores in memory.
#[derive(Default)]
pub struct InMemorySessionService {
    /// Map of session ID to session data
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    /// `app:` entries per app name
    app_state: Arc<RwLock<HashMap<String, StateMap>>>,
    /// `user:` entries per (app name, user id)
    user_state: Arc<RwLock<HashMap<(String, String), StateMap>>>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session. A missing id gets a generated one.
    ///
    /// The new session's state starts with the stored `app:` and `user:`
    /// entries for this app and user.
    pub async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<&str>,
    ) -> AppResult<Session> {
        let id = match session_id {
            Some(id) if id.trim().is_empty() => {
                return Err(AppError::validation("Session id cannot be empty"))
            }
            Some(id) => id.to_string(),
            None => format!("session-{}", uuid::Uuid::new_v4()),
        };

        let mut initial = StateMap::new();
        if let Some(app) = self.app_state.read().await.get(app_name) {
            initial.extend(app.clone());
        }
        if let Some(user) = self
            .user_state
            .read()
            .await
            .get(&(app_name.to_string(), user_id.to_string()))
        {
            initial.extend(user.clone());
        }

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            return Err(AppError::validation(format!(
                "Session already exists: {}",
                id
            )));
        }

        let now = Utc::now();
        let session = Session {
            id: id.clone(),
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            state: Arc::new(RwLock::new(initial)),
            events: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        sessions.insert(id.clone(), session.clone());
        tracing::debug!(session_id = %id, app = app_name, user = user_id, "session created");

        Ok(session)
    }

    /// Get a session by id.
    pub async fn get_session(&self, session_id: &str) -> AppResult<Session> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Session not found: {}", session_id)))
    }

    /// Sessions of one user, oldest first.
    pub async fn list_sessions(&self, app_name: &str, user_id: &str) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.app_name == app_name && s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        sessions
    }

    /// Delete a session. Deleting an unknown id is not an error.
    pub async fn delete_session(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// Record an event produced by an invocation.
    pub async fn append_event(
        &self,
        session_id: &str,
        invocation_id: &str,
        event: AgentEvent,
    ) -> AppResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::not_found(format!("Session not found: {}", session_id)))?;

        let now = Utc::now();
        session.events.push(RecordedEvent {
            invocation_id: invocation_id.to_string(),
            event,
            timestamp: now,
        });
        session.updated_at = now;
        Ok(())
    }

    /// Persist the scoped entries of a session's state after a run.
    ///
    /// `app:` and `user:` entries are copied to their stores and `temp:`
    /// entries are removed from the session.
    pub async fn commit_state(&self, session_id: &str) -> AppResult<()> {
        let session = self.get_session(session_id).await?;

        let scoped = {
            let mut state = session.state.write().await;
            let scoped = split_by_scope(&state);
            let dropped = strip_temp(&mut state);
            if dropped > 0 {
                tracing::debug!(session_id, dropped, "dropped temp state");
            }
            scoped
        };

        if !scoped.app.is_empty() {
            self.app_state
                .write()
                .await
                .entry(session.app_name.clone())
                .or_default()
                .extend(scoped.app);
        }
        if !scoped.user.is_empty() {
            self.user_state
                .write()
                .await
                .entry((session.app_name.clone(), session.user_id.clone()))
                .or_default()
                .extend(scoped.user);
        }
        Ok(())
    }
}
