//! Runner
//!
//! Drives the root agent for one user message inside a session. Every event
//! the agents emit is recorded in the session before it reaches the caller;
//! once the stream ends the session's scoped state is committed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use proposal_forge_core::StateMap;
use proposal_forge_llm::LlmProvider;

use crate::services::agent_composer::{
    Agent, AgentConfig, AgentContext, AgentEvent, AgentEventStream, AgentInput,
};
use crate::services::session::InMemorySessionService;
use crate::utils::error::{AppError, AppResult};

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub session_id: String,
    pub invocation_id: String,
    /// Output of the root agent's final `Done`.
    pub output: Option<String>,
    /// Session state after the run.
    pub final_state: StateMap,
    pub event_count: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Runs a root agent against sessions of one app.
pub struct Runner {
    app_name: String,
    agent: Arc<dyn Agent>,
    sessions: Arc<InMemorySessionService>,
    provider: Arc<dyn LlmProvider>,
    config: AgentConfig,
}

impl Runner {
    pub fn new(
        app_name: impl Into<String>,
        agent: Arc<dyn Agent>,
        sessions: Arc<InMemorySessionService>,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            agent,
            sessions,
            provider,
            config: AgentConfig::default(),
        }
    }

    /// Set the configuration handed to every agent.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    pub fn sessions(&self) -> &Arc<InMemorySessionService> {
        &self.sessions
    }

    /// Start the root agent on `message` and return its event stream.
    ///
    /// The session must already exist and belong to `user_id`. Each event is
    /// appended to the session as it passes through; the first error ends
    /// the stream.
    pub async fn run_async(
        &self,
        user_id: &str,
        session_id: &str,
        message: &str,
        cancel: CancellationToken,
    ) -> AppResult<(String, AgentEventStream)> {
        if message.trim().is_empty() {
            return Err(AppError::validation("Message cannot be empty"));
        }

        let session = self.sessions.get_session(session_id).await?;
        if session.user_id != user_id || session.app_name != self.app_name {
            return Err(AppError::validation(format!(
                "Session {} does not belong to user {} of {}",
                session_id, user_id, self.app_name
            )));
        }

        let ctx = AgentContext::new(
            session_id,
            self.provider.clone(),
            AgentInput::Text(message.to_string()),
        )
        .with_shared_state(session.state.clone())
        .with_config(self.config.clone())
        .with_cancel(cancel);
        let invocation_id = ctx.invocation_id.clone();

        tracing::info!(
            app = %self.app_name,
            session_id,
            invocation_id = %invocation_id,
            agent = self.agent.name(),
            "starting run"
        );
        let inner = self.agent.run(ctx).await?;

        let state = RecordingState {
            inner,
            sessions: self.sessions.clone(),
            session_id: session_id.to_string(),
            invocation_id: invocation_id.clone(),
            finished: false,
        };
        let stream = futures_util::stream::unfold(state, |mut state| async move {
            if state.finished {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(event)) => {
                    let recorded = state
                        .sessions
                        .append_event(&state.session_id, &state.invocation_id, event.clone())
                        .await;
                    match recorded {
                        Ok(()) => Some((Ok(event), state)),
                        Err(e) => {
                            state.finished = true;
                            Some((Err(e), state))
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(session_id = %state.session_id, error = %e, "run failed");
                    state.finished = true;
                    Some((Err(e), state))
                }
                None => {
                    state.finished = true;
                    match state.sessions.commit_state(&state.session_id).await {
                        Ok(()) => None,
                        Err(e) => Some((Err(e), state)),
                    }
                }
            }
        });

        Ok((invocation_id, Box::pin(stream)))
    }

    /// Run to completion, calling `on_event` for every event.
    pub async fn run_with<F>(
        &self,
        user_id: &str,
        session_id: &str,
        message: &str,
        cancel: CancellationToken,
        mut on_event: F,
    ) -> AppResult<RunSummary>
    where
        F: FnMut(&AgentEvent),
    {
        let started = Instant::now();
        let (invocation_id, mut stream) =
            self.run_async(user_id, session_id, message, cancel).await?;

        let mut event_count = 0;
        let mut input_tokens = 0u64;
        let mut output_tokens = 0u64;
        let mut output = None;
        while let Some(event) = stream.next().await {
            let event = event?;
            event_count += 1;
            match &event {
                AgentEvent::Usage {
                    input_tokens: i,
                    output_tokens: o,
                } => {
                    input_tokens += u64::from(*i);
                    output_tokens += u64::from(*o);
                }
                AgentEvent::Done { output: out } => output = out.clone(),
                _ => {}
            }
            on_event(&event);
        }

        let final_state = self.sessions.get_session(session_id).await?.snapshot().await.state;
        let duration = started.elapsed();
        tracing::info!(
            session_id,
            event_count,
            input_tokens,
            output_tokens,
            duration_ms = duration.as_millis() as u64,
            "run finished"
        );

        Ok(RunSummary {
            session_id: session_id.to_string(),
            invocation_id,
            output,
            final_state,
            event_count,
            input_tokens,
            output_tokens,
            duration,
        })
    }

    /// Run to completion and summarise.
    pub async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        message: &str,
        cancel: CancellationToken,
    ) -> AppResult<RunSummary> {
        self.run_with(user_id, session_id, message, cancel, |_| {})
            .await
    }
}

struct RecordingState {
    inner: AgentEventStream,
    sessions: Arc<InMemorySessionService>,
    session_id: String,
    invocation_id: String,
    finished: bool,
}
