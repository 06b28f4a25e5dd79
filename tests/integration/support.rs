//! Mock provider that answers by the role named in the system prompt.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use proposal_forge::services::proposal::{build_root_agent, default_pipeline, PipelineOptions};
use proposal_forge::services::{InMemorySessionService, Runner};
use proposal_forge_llm::{
    LlmError, LlmProvider, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig,
    StopReason, ToolCall, ToolDefinition,
};

pub const APP: &str = "ResearchProposalSystem";
pub const USER: &str = "student_researcher";
pub const SESSION: &str = "research_session";

/// One provider call as seen by the mock.
#[derive(Debug, Clone)]
pub struct Call {
    pub role: &'static str,
    pub system: String,
    pub native_search: bool,
    pub tools: Vec<String>,
    pub model: Option<String>,
}

#[derive(Default)]
struct Script {
    /// Evaluator answers, consumed in order; "Needs more detail." once empty.
    feedback: VecDeque<String>,
    revisions: usize,
    fail_role: Option<&'static str>,
    calls: Vec<Call>,
}

pub struct RoleProvider {
    config: ProviderConfig,
    script: Mutex<Script>,
}

impl RoleProvider {
    pub fn with_feedback(feedback: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            config: ProviderConfig::default(),
            script: Mutex::new(Script {
                feedback: feedback.iter().map(|f| f.to_string()).collect(),
                ..Default::default()
            }),
        })
    }

    /// Fail every call made for `role`.
    pub fn failing(role: &'static str) -> Arc<Self> {
        let provider = Self::with_feedback(&[]);
        provider.script.lock().unwrap().fail_role = Some(role);
        provider
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn roles(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|c| c.role).collect()
    }
}

fn role_of(system: &str) -> &'static str {
    const ROLES: [(&str, &str); 8] = [
        ("finding winning high school science competition projects", "winning"),
        ("understanding evaluation criteria", "criteria"),
        ("correlates winning projects with evaluation criteria", "analyzer"),
        ("research strategist", "intersector"),
        ("topic selection expert", "proposer"),
        ("write a comprehensive research proposal", "writer"),
        ("strict but fair evaluator", "evaluator"),
        ("revise the research proposal", "reviser"),
    ];
    ROLES
        .iter()
        .find(|(marker, _)| system.contains(marker))
        .map(|(_, role)| *role)
        .unwrap_or("unknown")
}

fn text(content: &str) -> LlmResult<LlmResponse> {
    let mut response = LlmResponse::text(content, "mock-model");
    response.usage.input_tokens = 100;
    response.usage.output_tokens = 20;
    Ok(response)
}

#[async_trait]
impl LlmProvider for RoleProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn supports_native_search(&self) -> bool {
        true
    }

    async fn send_message(
        &self,
        _messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
        options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let system = system.unwrap_or_default();
        let role = role_of(&system);
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call {
            role,
            system: system.clone(),
            native_search: options.native_search,
            tools: tools.iter().map(|t| t.name.clone()).collect(),
            model: options.model_override.clone(),
        });

        if script.fail_role == Some(role) {
            return Err(LlmError::ServerError {
                message: "backend unavailable".into(),
                status: Some(503),
            });
        }

        match role {
            "winning" => text("Winning projects: microplastic filters (ISEF 2023)"),
            "criteria" => text("Criteria: creativity, scientific thought, impact"),
            "analyzer" => text("Practical criteria: impact first"),
            "intersector" => text("Intersected topics: microplastics, soil microbiomes"),
            "proposer" => text("SELECTED TOPIC: microplastic filtration"),
            "writer" => text("Initial proposal"),
            "evaluator" => {
                let feedback = script
                    .feedback
                    .pop_front()
                    .unwrap_or_else(|| "Needs more detail.".to_string());
                text(&feedback)
            }
            "reviser" => {
                if system.contains("Evaluation Feedback (from the evaluator): APPROVED") {
                    let mut response = LlmResponse::text("", "mock-model");
                    response.content = None;
                    response.stop_reason = StopReason::ToolUse;
                    response.tool_calls = vec![ToolCall {
                        id: "call-exit".into(),
                        name: "exit_proposal_loop".into(),
                        arguments: serde_json::json!({}),
                    }];
                    Ok(response)
                } else {
                    script.revisions += 1;
                    text(&format!("Revised proposal v{}", script.revisions))
                }
            }
            _ => text("unexpected prompt"),
        }
    }

    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// Runner over the default pipeline with a fresh session.
pub async fn runner(provider: Arc<RoleProvider>, options: &PipelineOptions) -> Runner {
    let root = build_root_agent(&default_pipeline(options)).unwrap();
    let sessions = Arc::new(InMemorySessionService::new());
    sessions
        .create_session(APP, USER, Some(SESSION))
        .await
        .unwrap();
    Runner::new(APP, root, sessions, provider)
}
