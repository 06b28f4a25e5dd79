//! Pipeline Integration Tests
//!
//! Runs the default research proposal pipeline end to end.

use proposal_forge::services::agent_composer::AgentEvent;
use proposal_forge::services::proposal::{render_report, PipelineOptions, DEFAULT_QUERY};
use proposal_forge::AppError;
use tokio_util::sync::CancellationToken;

use super::support::{runner, RoleProvider, SESSION, USER};

const OUTPUT_KEYS: [&str; 7] = [
    "winning_projects",
    "evaluation_criteria",
    "practical_criteria",
    "intersected_topics",
    "topic_proposal",
    "research_proposal",
    "evaluation_feedback",
];

fn started(events: &[AgentEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::Started { agent } => Some(agent.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_full_run_approved_after_one_revision() {
    let provider = RoleProvider::with_feedback(&["Needs a clearer timeline.", "APPROVED"]);
    let runner = runner(provider.clone(), &PipelineOptions::default()).await;

    let mut events = Vec::new();
    let summary = runner
        .run_with(USER, SESSION, DEFAULT_QUERY, CancellationToken::new(), |e| {
            events.push(e.clone())
        })
        .await
        .unwrap();

    let roles = provider.roles();
    assert_eq!(roles.len(), 9);
    let mut research = roles[..2].to_vec();
    research.sort();
    assert_eq!(research, vec!["criteria", "winning"]);
    assert_eq!(
        roles[2..].to_vec(),
        vec![
            "analyzer",
            "intersector",
            "proposer",
            "writer",
            "evaluator",
            "reviser",
            "evaluator"
        ]
    );

    for key in OUTPUT_KEYS {
        assert!(summary.final_state.contains_key(key), "missing {}", key);
    }
    assert_eq!(
        summary.final_state["research_proposal"],
        serde_json::json!("Revised proposal v1")
    );
    assert_eq!(
        summary.final_state["evaluation_feedback"],
        serde_json::json!("APPROVED")
    );
    assert_eq!(summary.output.as_deref(), Some("APPROVED"));
    assert_eq!(summary.input_tokens, 900);
    assert_eq!(summary.event_count, events.len());

    let report = render_report(&summary.final_state);
    assert!(report.contains("6️⃣  FINAL RESEARCH PROPOSAL:"));
    assert!(report.contains("Revised proposal v1"));
}

#[tokio::test]
async fn test_agents_receive_tools_model_and_state() {
    let provider = RoleProvider::with_feedback(&["Needs a clearer timeline.", "APPROVED"]);
    let runner = runner(provider.clone(), &PipelineOptions::default()).await;
    runner
        .run(USER, SESSION, DEFAULT_QUERY, CancellationToken::new())
        .await
        .unwrap();

    let calls = provider.calls();
    for call in &calls {
        assert_eq!(call.model.as_deref(), Some("gemini-2.5-flash-lite"));
        let searches = matches!(call.role, "winning" | "criteria" | "intersector");
        assert_eq!(call.native_search, searches, "{}", call.role);
        if call.role == "reviser" {
            assert_eq!(call.tools, vec!["exit_proposal_loop".to_string()]);
        } else {
            assert!(call.tools.is_empty(), "{}", call.role);
        }
    }

    let analyzer = calls.iter().find(|c| c.role == "analyzer").unwrap();
    assert!(analyzer
        .system
        .contains("Winning Projects: Winning projects: microplastic filters (ISEF 2023)"));
    assert!(analyzer
        .system
        .contains("Evaluation Criteria: Criteria: creativity, scientific thought, impact"));

    let evaluator = calls.iter().find(|c| c.role == "evaluator").unwrap();
    assert!(evaluator.system.contains("Research Proposal: Initial proposal"));
}

#[tokio::test]
async fn test_initial_approval_skips_refinement() {
    let provider = RoleProvider::with_feedback(&["APPROVED"]);
    let runner = runner(provider.clone(), &PipelineOptions::default()).await;

    let mut events = Vec::new();
    let summary = runner
        .run_with(USER, SESSION, DEFAULT_QUERY, CancellationToken::new(), |e| {
            events.push(e.clone())
        })
        .await
        .unwrap();

    assert_eq!(provider.calls().len(), 7);
    assert!(!started(&events).contains(&"RefinedProposalWriter".to_string()));
    assert_eq!(
        summary.final_state["research_proposal"],
        serde_json::json!("Initial proposal")
    );
}

#[tokio::test]
async fn test_refinement_capped_at_three_rounds() {
    let provider = RoleProvider::with_feedback(&[]);
    let runner = runner(provider.clone(), &PipelineOptions::default()).await;

    let mut events = Vec::new();
    let summary = runner
        .run_with(USER, SESSION, DEFAULT_QUERY, CancellationToken::new(), |e| {
            events.push(e.clone())
        })
        .await
        .unwrap();

    let writers = started(&events)
        .into_iter()
        .filter(|a| a == "RefinedProposalWriter")
        .count();
    assert_eq!(writers, 3);
    assert_eq!(provider.calls().len(), 13);
    assert_eq!(
        summary.final_state["research_proposal"],
        serde_json::json!("Revised proposal v3")
    );
    assert_eq!(
        summary.final_state["evaluation_feedback"],
        serde_json::json!("Needs more detail.")
    );
}

#[tokio::test]
async fn test_max_refinements_option() {
    let provider = RoleProvider::with_feedback(&[]);
    let options = PipelineOptions {
        max_refinements: 1,
        ..Default::default()
    };
    let runner = runner(provider.clone(), &options).await;
    let summary = runner
        .run(USER, SESSION, DEFAULT_QUERY, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(provider.calls().len(), 9);
    assert_eq!(
        summary.final_state["research_proposal"],
        serde_json::json!("Revised proposal v1")
    );
}

#[tokio::test]
async fn test_writer_exit_tool_ends_loop() {
    let provider =
        RoleProvider::with_feedback(&["Needs a budget.", "APPROVED with minor notes"]);
    let runner = runner(provider.clone(), &PipelineOptions::default()).await;

    let mut events = Vec::new();
    let summary = runner
        .run_with(USER, SESSION, DEFAULT_QUERY, CancellationToken::new(), |e| {
            events.push(e.clone())
        })
        .await
        .unwrap();

    assert_eq!(
        provider.roles()[7..].to_vec(),
        vec!["reviser", "evaluator", "reviser"]
    );
    assert!(events.iter().any(|e| e.is_escalation()));
    assert!(events.iter().any(|e| matches!(
        e,
        AgentEvent::ToolResult { name, result, .. }
            if name == "exit_proposal_loop" && result.contains("approved")
    )));
    // the escalating turn keeps the last revision
    assert_eq!(
        summary.final_state["research_proposal"],
        serde_json::json!("Revised proposal v1")
    );
}

#[tokio::test]
async fn test_research_failure_stops_run() {
    let provider = RoleProvider::failing("criteria");
    let runner = runner(provider.clone(), &PipelineOptions::default()).await;

    let result = runner
        .run(USER, SESSION, DEFAULT_QUERY, CancellationToken::new())
        .await;
    assert!(matches!(result, Err(AppError::Llm(_))));
    assert!(!provider.roles().contains(&"analyzer"));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let provider = RoleProvider::with_feedback(&[]);
    let runner = runner(provider.clone(), &PipelineOptions::default()).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = runner.run(USER, SESSION, DEFAULT_QUERY, cancel).await;
    assert!(matches!(result, Err(e) if e.is_cancelled()));
    assert!(provider.calls().is_empty());
}
