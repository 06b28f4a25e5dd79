//! HTTP-level provider tests
//!
//! These tests use wiremock to stand in for the hosted model APIs so request
//! shape, header handling and error mapping can be checked without network
//! access.

use proposal_forge_llm::{
    GeminiProvider, LlmError, LlmProvider, LlmRequestOptions, Message, OpenAIProvider,
    ProviderConfig, ProviderType, StopReason,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/models/gemini-2.5-flash-lite:generateContent";

fn gemini(server: &MockServer) -> GeminiProvider {
    GeminiProvider::new(ProviderConfig {
        provider: ProviderType::Gemini,
        api_key: Some("mock-key".to_string()),
        base_url: Some(server.uri()),
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap()
}

fn openai(server: &MockServer) -> OpenAIProvider {
    OpenAIProvider::new(ProviderConfig {
        provider: ProviderType::OpenAI,
        api_key: Some("sk-mock".to_string()),
        base_url: Some(server.uri()),
        model: "gpt-4o-mini".to_string(),
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn gemini_sends_key_and_search_tool() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "mock-key"))
        .and(body_partial_json(json!({
            "tools": [{ "google_search": {} }],
            "systemInstruction": { "parts": [{ "text": "You are a research specialist." }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Top ISEF projects..." }] },
                "finishReason": "STOP",
                "groundingMetadata": {
                    "webSearchQueries": ["ISEF grand award winners"],
                    "groundingChunks": [{ "web": { "uri": "https://example.org/a", "title": "A" } }]
                }
            }],
            "usageMetadata": { "promptTokenCount": 20, "candidatesTokenCount": 7 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = gemini(&server)
        .send_message(
            vec![Message::user("Find winners")],
            Some("You are a research specialist.".to_string()),
            vec![],
            LlmRequestOptions {
                native_search: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(response.content.as_deref(), Some("Top ISEF projects..."));
    assert_eq!(response.stop_reason, StopReason::EndTurn);
    assert_eq!(response.usage.input_tokens, 20);
    assert_eq!(response.search_queries, vec!["ISEF grand award winners"]);
    assert_eq!(response.citations.len(), 1);
}

#[tokio::test]
async fn gemini_model_override_changes_path() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "ok" }] },
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = gemini(&server)
        .send_message(
            vec![Message::user("hi")],
            None,
            vec![],
            LlmRequestOptions {
                model_override: Some("gemini-2.5-pro".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(response.model, "gemini-2.5-pro");
}

#[tokio::test]
async fn gemini_maps_http_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let err = gemini(&server)
        .send_message(vec![Message::user("hi")], None, vec![], Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::RateLimited { .. }));
}

#[tokio::test]
async fn gemini_malformed_body_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = gemini(&server)
        .send_message(vec![Message::user("hi")], None, vec![], Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::ParseError { .. }));
}

#[tokio::test]
async fn gemini_health_check_and_model_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("x-goog-api-key", "mock-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "models/gemini-2.5-flash-lite" },
                { "name": "models/text-embedding-004" }
            ]
        })))
        .mount(&server)
        .await;

    let provider = gemini(&server);
    provider.health_check().await.unwrap();
    let models = provider.list_models().await.unwrap().unwrap();
    assert_eq!(models, vec!["gemini-2.5-flash-lite"]);
}

#[tokio::test]
async fn gemini_health_check_rejects_bad_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(401).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let err = gemini(&server).health_check().await.unwrap_err();
    assert!(matches!(err, LlmError::AuthenticationFailed { .. }));
}

#[tokio::test]
async fn openai_chat_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-mock"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini",
            "choices": [{
                "message": { "role": "assistant", "content": "APPROVED" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 5, "completion_tokens": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = openai(&server)
        .send_message(vec![Message::user("Evaluate")], None, vec![], Default::default())
        .await
        .unwrap();
    assert_eq!(response.content.as_deref(), Some("APPROVED"));
    assert_eq!(response.usage.total_tokens(), 6);
}
