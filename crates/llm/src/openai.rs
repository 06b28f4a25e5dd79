//! OpenAI Provider
//!
//! Implementation of the LlmProvider trait for OpenAI's chat-completions API
//! and compatible endpoints. Function tools only; no hosted web search.

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{missing_api_key_error, network_error, parse_http_error, LlmProvider};
use super::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, MessageContent, MessageRole,
    ProviderConfig, StopReason, ToolCall, ToolCallMode, ToolDefinition, UsageStats,
};
use crate::http_client::build_http_client;

/// Default OpenAI API endpoint
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// OpenAI provider
pub struct OpenAIProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with the given configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(config.timeout_secs, config.proxy_url.as_deref())?;
        Ok(Self { config, client })
    }

    /// Get the API base URL
    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(OPENAI_API_URL)
            .trim_end_matches('/')
    }

    fn api_key(&self) -> LlmResult<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| missing_api_key_error("openai"))
    }

    /// Check if model supports reasoning (o1/o3 models)
    fn model_supports_reasoning(model: &str) -> bool {
        let model = model.to_lowercase();
        model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4")
    }

    /// Build the request body for the API
    fn build_request_body(
        &self,
        messages: &[Message],
        system: Option<&str>,
        tools: &[ToolDefinition],
        request_options: &LlmRequestOptions,
    ) -> serde_json::Value {
        let model = request_options
            .model_override
            .as_deref()
            .unwrap_or(&self.config.model);
        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": self.config.max_tokens,
        });

        // Reasoning models reject temperature.
        if !Self::model_supports_reasoning(model) {
            if let Some(temp) = request_options
                .temperature_override
                .or(self.config.temperature)
            {
                body["temperature"] = serde_json::json!(temp);
            }
        }

        let mut openai_messages: Vec<serde_json::Value> = Vec::new();
        if let Some(sys) = system.filter(|s| !s.is_empty()) {
            openai_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }
        for msg in messages {
            openai_messages.extend(self.message_to_openai(msg));
        }
        body["messages"] = serde_json::json!(openai_messages);

        if !tools.is_empty() && !matches!(request_options.tool_call_mode, ToolCallMode::None) {
            let openai_tools: Vec<serde_json::Value> =
                tools.iter().map(|t| self.tool_to_openai(t)).collect();
            body["tools"] = serde_json::json!(openai_tools);
            if matches!(request_options.tool_call_mode, ToolCallMode::Required) {
                body["tool_choice"] = serde_json::json!("required");
            }
        }

        body
    }

    /// Convert a Message to OpenAI API format.
    ///
    /// Each tool result becomes its own `tool` message.
    fn message_to_openai(&self, message: &Message) -> Vec<serde_json::Value> {
        let role = match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        };

        let tool_results: Vec<serde_json::Value> = message
            .content
            .iter()
            .filter_map(|c| match c {
                MessageContent::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => Some(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": tool_use_id,
                    "content": content
                })),
                _ => None,
            })
            .collect();
        if !tool_results.is_empty() {
            return tool_results;
        }

        let tool_calls: Vec<serde_json::Value> = message
            .content
            .iter()
            .filter_map(|c| match c {
                MessageContent::ToolUse { id, name, input } => Some(serde_json::json!({
                    "id": id,
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": input.to_string()
                    }
                })),
                _ => None,
            })
            .collect();

        let text_content = message.text_content();
        if !tool_calls.is_empty() {
            let content = if text_content.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::json!(text_content)
            };
            return vec![serde_json::json!({
                "role": role,
                "content": content,
                "tool_calls": tool_calls
            })];
        }

        vec![serde_json::json!({
            "role": role,
            "content": text_content
        })]
    }

    /// Convert a ToolDefinition to OpenAI API format
    fn tool_to_openai(&self, tool: &ToolDefinition) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema
            }
        })
    }

    /// Parse a response from OpenAI API
    fn parse_response(&self, response: OpenAIResponse) -> LlmResult<LlmResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError {
                message: "Response contained no choices".to_string(),
            })?;

        let mut content = None;
        let mut tool_calls = Vec::new();
        if let Some(msg) = choice.message {
            content = msg.content.filter(|c| !c.is_empty());
            for tc in msg.tool_calls.unwrap_or_default() {
                let arguments: serde_json::Value = serde_json::from_str(&tc.function.arguments)
                    .map_err(|e| LlmError::ParseError {
                        message: format!(
                            "Invalid arguments for tool call {}: {}",
                            tc.function.name, e
                        ),
                    })?;
                tool_calls.push(ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                });
            }
        }

        let stop_reason = choice
            .finish_reason
            .as_deref()
            .map(StopReason::from)
            .unwrap_or(StopReason::EndTurn);

        let usage = response
            .usage
            .map(|u| UsageStats {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                thinking_tokens: u
                    .completion_tokens_details
                    .and_then(|d| d.reasoning_tokens),
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            tool_calls,
            stop_reason,
            usage,
            model: response.model,
            search_queries: vec![],
            citations: vec![],
        })
    }

    async fn fetch_models(&self) -> LlmResult<Vec<String>> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .get(format!("{}/models", self.base_url()))
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(network_error)?;
        if status != 200 {
            return Err(parse_http_error(status, &body_text, "openai"));
        }

        let body: serde_json::Value =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: e.to_string(),
            })?;
        Ok(body["data"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["id"].as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn supports_tools(&self) -> bool {
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
        if request_options.native_search {
            tracing::warn!("openai provider has no hosted web search; answering without it");
        }

        let body = self.build_request_body(&messages, system.as_deref(), &tools, &request_options);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url()))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(network_error)?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, "openai"));
        }

        let openai_response: OpenAIResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        self.parse_response(openai_response)
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
            .filter(|id| {
                id.starts_with("gpt") || id.starts_with("o1") || id.starts_with("o3")
            })
            .collect();
        Ok(Some(models))
    }
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct CompletionTokensDetails {
    reasoning_tokens: Option<u32>,
}
