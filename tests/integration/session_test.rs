//! Session Integration Tests
//!
//! Events and state recorded by the runner in the session service.

use proposal_forge::services::agent_composer::AgentEvent;
use proposal_forge::services::proposal::{PipelineOptions, DEFAULT_QUERY};
use tokio_util::sync::CancellationToken;

use super::support::{runner, RoleProvider, APP, SESSION, USER};

#[tokio::test]
async fn test_session_records_every_event() {
    let provider = RoleProvider::with_feedback(&["APPROVED"]);
    let runner = runner(provider, &PipelineOptions::default()).await;
    let summary = runner
        .run(USER, SESSION, DEFAULT_QUERY, CancellationToken::new())
        .await
        .unwrap();

    let session = runner.sessions().get_session(SESSION).await.unwrap();
    assert_eq!(session.events.len(), summary.event_count);
    assert!(matches!(
        session.events.last().map(|e| &e.event),
        Some(AgentEvent::Done { .. })
    ));

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.state, summary.final_state);
    assert_eq!(snapshot.app_name, APP);
}

#[tokio::test]
async fn test_second_run_sees_previous_outputs() {
    let provider = RoleProvider::with_feedback(&["APPROVED", "APPROVED"]);
    let runner = runner(provider.clone(), &PipelineOptions::default()).await;

    runner
        .run(USER, SESSION, DEFAULT_QUERY, CancellationToken::new())
        .await
        .unwrap();
    let first_calls = provider.calls().len();

    let summary = runner
        .run(USER, SESSION, "Try again", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(provider.calls().len(), first_calls * 2);

    let session = runner.sessions().get_session(SESSION).await.unwrap();
    assert_eq!(session.events.len(), summary.event_count * 2);
    let invocations: std::collections::HashSet<_> =
        session.events.iter().map(|e| e.invocation_id.clone()).collect();
    assert_eq!(invocations.len(), 2);
}
