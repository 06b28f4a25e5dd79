//! Gemini Provider
//!
//! Implementation of the LlmProvider trait for the Google Generative Language
//! REST API (`models/{model}:generateContent`). Supports function calling and
//! the hosted `google_search` grounding tool.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{missing_api_key_error, network_error, parse_http_error, LlmProvider};
use super::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, MessageContent, MessageRole,
    ProviderConfig, SearchCitation, StopReason, ToolCall, ToolCallMode, ToolDefinition,
    UsageStats,
};
use crate::http_client::build_http_client;

/// Default Generative Language API endpoint
pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider
pub struct GeminiProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider with the given configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(config.timeout_secs, config.proxy_url.as_deref())?;
        Ok(Self { config, client })
    }

    /// Get the API base URL
    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(GEMINI_API_URL)
            .trim_end_matches('/')
    }

    fn api_key(&self) -> LlmResult<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| missing_api_key_error("gemini"))
    }

    fn generate_url(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:generateContent", self.base_url(), model)
    }

    /// Build the request body for the API
    fn build_request_body(
        &self,
        messages: &[Message],
        system: Option<&str>,
        tools: &[ToolDefinition],
        request_options: &LlmRequestOptions,
    ) -> serde_json::Value {
        let mut generation_config = serde_json::json!({
            "maxOutputTokens": self.config.max_tokens,
        });
        if let Some(temp) = request_options
            .temperature_override
            .or(self.config.temperature)
        {
            generation_config["temperature"] = serde_json::json!(temp);
        }

        let mut body = serde_json::json!({
            "contents": self.messages_to_contents(messages),
            "generationConfig": generation_config,
        });

        // System messages inside the conversation are folded into the
        // system instruction, after the explicit prompt.
        let mut system_parts: Vec<String> = system
            .filter(|s| !s.is_empty())
            .map(|s| vec![s.to_string()])
            .unwrap_or_default();
        system_parts.extend(
            messages
                .iter()
                .filter(|m| m.role == MessageRole::System)
                .map(|m| m.text_content()),
        );
        if !system_parts.is_empty() {
            body["systemInstruction"] = serde_json::json!({
                "parts": system_parts
                    .iter()
                    .map(|t| serde_json::json!({ "text": t }))
                    .collect::<Vec<_>>()
            });
        }

        let mut gemini_tools: Vec<serde_json::Value> = Vec::new();
        let send_functions =
            !tools.is_empty() && !matches!(request_options.tool_call_mode, ToolCallMode::None);
        if send_functions {
            let declarations: Vec<serde_json::Value> =
                tools.iter().map(|t| self.tool_to_gemini(t)).collect();
            gemini_tools.push(serde_json::json!({ "functionDeclarations": declarations }));
        }
        if request_options.native_search {
            gemini_tools.push(serde_json::json!({ "google_search": {} }));
        }
        if !gemini_tools.is_empty() {
            body["tools"] = serde_json::json!(gemini_tools);
        }
        if send_functions {
            let mode = match request_options.tool_call_mode {
                ToolCallMode::Required => "ANY",
                _ => "AUTO",
            };
            body["toolConfig"] = serde_json::json!({
                "functionCallingConfig": { "mode": mode }
            });
        }

        body
    }

    /// Convert conversation messages to Gemini `contents`.
    ///
    /// Function responses must carry the function name, which our tool-result
    /// blocks only reference by call id; names are recovered from the
    /// preceding `ToolUse` blocks.
    fn messages_to_contents(&self, messages: &[Message]) -> Vec<serde_json::Value> {
        let mut call_names: HashMap<&str, &str> = HashMap::new();
        let mut contents = Vec::new();

        for msg in messages {
            let role = match msg.role {
                MessageRole::System => continue,
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };

            let mut parts = Vec::new();
            for block in &msg.content {
                match block {
                    MessageContent::Text { text } => {
                        if !text.is_empty() {
                            parts.push(serde_json::json!({ "text": text }));
                        }
                    }
                    MessageContent::ToolUse { id, name, input } => {
                        call_names.insert(id.as_str(), name.as_str());
                        parts.push(serde_json::json!({
                            "functionCall": { "id": id, "name": name, "args": input }
                        }));
                    }
                    MessageContent::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } => {
                        let name = call_names
                            .get(tool_use_id.as_str())
                            .copied()
                            .unwrap_or(tool_use_id.as_str());
                        let response = function_response_payload(content, is_error.unwrap_or(false));
                        parts.push(serde_json::json!({
                            "functionResponse": {
                                "id": tool_use_id,
                                "name": name,
                                "response": response
                            }
                        }));
                    }
                }
            }

            if !parts.is_empty() {
                contents.push(serde_json::json!({ "role": role, "parts": parts }));
            }
        }

        contents
    }

    /// Convert a ToolDefinition to a Gemini function declaration
    fn tool_to_gemini(&self, tool: &ToolDefinition) -> serde_json::Value {
        let mut decl = serde_json::json!({
            "name": tool.name,
            "description": tool.description,
        });
        // Gemini rejects object schemas without properties.
        if !tool.input_schema.is_empty_object() {
            decl["parameters"] = serde_json::json!(tool.input_schema);
        }
        decl
    }

    /// Parse a response from the Gemini API
    fn parse_response(&self, response: GeminiResponse, model: &str) -> LlmResult<LlmResponse> {
        let usage = response
            .usage_metadata
            .map(|u| UsageStats {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
                thinking_tokens: u.thoughts_token_count,
            })
            .unwrap_or_default();
        let model = response.model_version.unwrap_or_else(|| model.to_string());

        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(LlmError::Blocked { message: reason });
        };

        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if part.thought.unwrap_or(false) {
                continue;
            }
            if let Some(text) = part.text {
                texts.push(text);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall {
                    id: call
                        .id
                        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple())),
                    name: call.name,
                    arguments: call.args.unwrap_or_else(|| serde_json::json!({})),
                });
            }
        }

        let stop_reason = if !tool_calls.is_empty() {
            StopReason::ToolUse
        } else {
            candidate
                .finish_reason
                .as_deref()
                .map(StopReason::from)
                .unwrap_or(StopReason::EndTurn)
        };

        let (search_queries, citations) = match candidate.grounding_metadata {
            Some(meta) => (
                meta.web_search_queries,
                meta.grounding_chunks
                    .into_iter()
                    .filter_map(|c| c.web)
                    .map(|w| SearchCitation {
                        uri: w.uri,
                        title: w.title,
                    })
                    .collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };

        let content = texts.concat();
        Ok(LlmResponse {
            content: if content.is_empty() { None } else { Some(content) },
            tool_calls,
            stop_reason,
            usage,
            model,
            search_queries,
            citations,
        })
    }

    async fn fetch_models(&self) -> LlmResult<Vec<String>> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .get(format!("{}/models", self.base_url()))
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(network_error)?;
        if status != 200 {
            return Err(parse_http_error(status, &body_text, "gemini"));
        }

        let list: ModelList = serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
            message: format!("Failed to parse model list: {}", e),
        })?;
        Ok(list
            .models
            .into_iter()
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .collect())
    }
}

/// Function responses must be JSON objects.
fn function_response_payload(content: &str, is_error: bool) -> serde_json::Value {
    if is_error {
        return serde_json::json!({ "error": content });
    }
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        Ok(other) => serde_json::json!({ "result": other }),
        Err(_) => serde_json::json!({ "result": content }),
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn supports_native_search(&self) -> bool {
        true
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let api_key = self.api_key()?;
        let model = request_options
            .model_override
            .clone()
            .unwrap_or_else(|| self.config.model.clone());
        let body = self.build_request_body(&messages, system.as_deref(), &tools, &request_options);

        tracing::debug!(
            model = %model,
            messages = messages.len(),
            tools = tools.len(),
            native_search = request_options.native_search,
            "gemini generateContent"
        );

        let response = self
            .client
            .post(self.generate_url(&model))
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(network_error)?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, "gemini"));
        }

        let gemini_response: GeminiResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        self.parse_response(gemini_response, &model)
    }

    async fn health_check(&self) -> LlmResult<()> {
        self.fetch_models().await.map(|_| ())
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn list_models(&self) -> LlmResult<Option<Vec<String>>> {
        let models = self
            .fetch_models()
            .await?
            .into_iter()
            .filter(|id| id.starts_with("gemini"))
            .collect();
        Ok(Some(models))
    }
}

/// Gemini API response format
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    thought: Option<bool>,
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    id: Option<String>,
    name: String,
    args: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    web_search_queries: Vec<String>,
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: String,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    thoughts_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParameterSchema, ProviderType};

    fn test_config() -> ProviderConfig {
        ProviderConfig {
            provider: ProviderType::Gemini,
            api_key: Some("test-key".to_string()),
            ..Default::default()
        }
    }

    fn provider() -> GeminiProvider {
        GeminiProvider::new(test_config()).unwrap()
    }

    fn exit_tool() -> ToolDefinition {
        ToolDefinition {
            name: "exit_proposal_loop".to_string(),
            description: "Exit the loop".to_string(),
            input_schema: ParameterSchema::object(None, HashMap::new(), vec![]),
        }
    }

    #[test]
    fn test_provider_creation() {
        let p = provider();
        assert_eq!(p.name(), "gemini");
        assert_eq!(p.model(), "gemini-2.5-flash-lite");
        assert!(p.supports_tools());
        assert!(p.supports_native_search());
        assert_eq!(
            p.generate_url("models/gemini-2.5-flash-lite"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-lite:generateContent"
        );
    }

    #[test]
    fn test_request_body_with_system_and_search() {
        let p = provider();
        let options = LlmRequestOptions {
            native_search: true,
            temperature_override: Some(0.2),
            ..Default::default()
        };
        let body = p.build_request_body(
            &[Message::user("Find ISEF winners")],
            Some("You are a research specialist."),
            &[],
            &options,
        );

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Find ISEF winners");
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are a research specialist."
        );
        assert_eq!(body["tools"][0], serde_json::json!({ "google_search": {} }));
        assert!(body.get("toolConfig").is_none());
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_function_declaration_omits_empty_parameters() {
        let p = provider();
        let decl = p.tool_to_gemini(&exit_tool());
        assert_eq!(decl["name"], "exit_proposal_loop");
        assert!(decl.get("parameters").is_none());

        let body = p.build_request_body(
            &[Message::user("hi")],
            None,
            &[exit_tool()],
            &LlmRequestOptions {
                tool_call_mode: ToolCallMode::Required,
                ..Default::default()
            },
        );
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "exit_proposal_loop"
        );
        assert_eq!(body["toolConfig"]["functionCallingConfig"]["mode"], "ANY");
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_tool_call_mode_none_drops_functions() {
        let p = provider();
        let body = p.build_request_body(
            &[Message::user("hi")],
            None,
            &[exit_tool()],
            &LlmRequestOptions {
                tool_call_mode: ToolCallMode::None,
                ..Default::default()
            },
        );
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_function_response_recovers_name() {
        let p = provider();
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "exit_proposal_loop".to_string(),
            arguments: serde_json::json!({}),
        };
        let messages = vec![
            Message::user("Revise"),
            Message::assistant_tool_calls(None, &[call]),
            Message::tool_result("call_1", r#"{"status":"approved"}"#, false),
        ];
        let contents = p.messages_to_contents(&messages);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(
            contents[1]["parts"][0]["functionCall"]["name"],
            "exit_proposal_loop"
        );
        let response = &contents[2]["parts"][0]["functionResponse"];
        assert_eq!(response["name"], "exit_proposal_loop");
        assert_eq!(response["response"]["status"], "approved");
    }

    #[test]
    fn test_function_response_payload_wrapping() {
        assert_eq!(
            function_response_payload("plain text", false),
            serde_json::json!({ "result": "plain text" })
        );
        assert_eq!(
            function_response_payload("[1,2]", false),
            serde_json::json!({ "result": [1, 2] })
        );
        assert_eq!(
            function_response_payload("boom", true),
            serde_json::json!({ "error": "boom" })
        );
    }

    #[test]
    fn test_parse_text_with_grounding() {
        let p = provider();
        let raw: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [
                    { "text": "Winning projects: " },
                    { "text": "solar desalination." }
                ]},
                "finishReason": "STOP",
                "groundingMetadata": {
                    "webSearchQueries": ["ISEF 2024 grand award winners"],
                    "groundingChunks": [{ "web": { "uri": "https://example.org/isef", "title": "ISEF" } }]
                }
            }],
            "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 34 },
            "modelVersion": "gemini-2.5-flash-lite-001"
        }))
        .unwrap();

        let resp = p.parse_response(raw, "gemini-2.5-flash-lite").unwrap();
        assert_eq!(resp.content.as_deref(), Some("Winning projects: solar desalination."));
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
        assert_eq!(resp.usage.input_tokens, 12);
        assert_eq!(resp.usage.output_tokens, 34);
        assert_eq!(resp.model, "gemini-2.5-flash-lite-001");
        assert_eq!(resp.search_queries, vec!["ISEF 2024 grand award winners"]);
        assert_eq!(resp.citations[0].uri, "https://example.org/isef");
    }

    #[test]
    fn test_parse_function_call_without_id() {
        let p = provider();
        let raw: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [
                    { "functionCall": { "name": "exit_proposal_loop", "args": {} } }
                ]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        let resp = p.parse_response(raw, "gemini-2.5-flash-lite").unwrap();
        assert!(resp.content.is_none());
        assert_eq!(resp.stop_reason, StopReason::ToolUse);
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "exit_proposal_loop");
        assert!(resp.tool_calls[0].id.starts_with("call_"));
        assert_eq!(resp.model, "gemini-2.5-flash-lite");
    }

    #[test]
    fn test_parse_blocked_prompt() {
        let p = provider();
        let raw: GeminiResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        let err = p.parse_response(raw, "gemini-2.5-flash-lite").unwrap_err();
        assert_eq!(
            err,
            LlmError::Blocked {
                message: "SAFETY".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let p = GeminiProvider::new(ProviderConfig {
            api_key: None,
            ..test_config()
        })
        .unwrap();
        let err = p
            .send_message(vec![Message::user("hi")], None, vec![], Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::AuthenticationFailed { .. }));
    }
}
