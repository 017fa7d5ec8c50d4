//! OpenAI-compatible provider
//!
//! Speaks the Chat Completions wire format, which OpenAI and most
//! self-hosted gateways (vLLM, Ollama, LiteLLM) accept. The API key is not
//! stored here; the router resolves one per call and passes it in
//! [`ChatOptions::api_key`].
//!
//! Tool turns are paired on the wire: a tool-request turn becomes an
//! assistant message carrying `tool_calls`, and the matching result turn
//! becomes a `tool` message with the same `tool_call_id`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, Result};

use super::types::{
    ChatOptions, LLMProvider, LLMResponse, LLMToolCall, Role, ToolDefinition, Turn, Usage,
};
use super::parse_provider_error;

/// The OpenAI API endpoint URL.
const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// The default model to use.
const DEFAULT_MODEL: &str = "gpt-4o";

/// Timeout for the reachability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAIToolCallRequest {
    id: String,
    r#type: &'static str,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: &'static str,
    function: OpenAIFunctionDef,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCallResponse>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCallResponse {
    id: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
    #[serde(default)]
    r#type: Option<String>,
}

// ============================================================================
// Provider
// ============================================================================

/// OpenAI-compatible LLM provider.
pub struct OpenAIProvider {
    name: String,
    api_base: String,
    default_model: String,
    requires_key: bool,
    client: Client,
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAIProvider {
    /// Provider for the public OpenAI endpoint.
    ///
    /// # Example
    /// ```
    /// use arborclaw::providers::{LLMProvider, OpenAIProvider};
    ///
    /// let provider = OpenAIProvider::new();
    /// assert_eq!(provider.name(), "openai");
    /// assert_eq!(provider.default_model(), "gpt-4o");
    /// ```
    pub fn new() -> Self {
        Self::with_base_url(OPENAI_API_URL)
    }

    /// Provider for any OpenAI-compatible endpoint. A trailing slash is removed.
    pub fn with_base_url(api_base: &str) -> Self {
        Self::with_client(api_base, Client::new())
    }

    /// Provider with a caller-built HTTP client (proxies, custom timeouts).
    pub fn with_client(api_base: &str, client: Client) -> Self {
        Self {
            name: "openai".to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            requires_key: true,
            client,
        }
    }

    /// Name reported to the router and in logs.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_default_model(mut self, model: &str) -> Self {
        self.default_model = model.to_string();
        self
    }

    /// Local gateways usually accept unauthenticated requests.
    pub fn with_key_required(mut self, required: bool) -> Self {
        self.requires_key = required;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

// ============================================================================
// Conversion
// ============================================================================

fn convert_turns(turns: Vec<Turn>) -> Vec<OpenAIMessage> {
    turns
        .into_iter()
        .map(|turn| {
            let Turn {
                role,
                content,
                tool_name,
                tool_call_id,
                arguments,
            } = turn;

            match (role, tool_call_id, arguments) {
                (Role::Tool, Some(id), Some(arguments)) => OpenAIMessage {
                    role: "assistant",
                    content: (!content.is_empty()).then_some(content),
                    tool_calls: Some(vec![OpenAIToolCallRequest {
                        id,
                        r#type: "function",
                        function: OpenAIFunctionCall {
                            name: tool_name.unwrap_or_default(),
                            arguments,
                        },
                    }]),
                    tool_call_id: None,
                },
                (Role::Tool, Some(id), None) => OpenAIMessage {
                    role: "tool",
                    content: Some(content),
                    tool_calls: None,
                    tool_call_id: Some(id),
                },
                // Unpaired tool output cannot be a `tool` message on this wire
                (Role::Tool, None, _) => OpenAIMessage {
                    role: "user",
                    content: Some(format!(
                        "[{} output] {}",
                        tool_name.as_deref().unwrap_or("tool"),
                        content
                    )),
                    tool_calls: None,
                    tool_call_id: None,
                },
                (role, _, _) => OpenAIMessage {
                    role: match role {
                        Role::System => "system",
                        Role::Assistant => "assistant",
                        _ => "user",
                    },
                    content: Some(content),
                    tool_calls: None,
                    tool_call_id: None,
                },
            }
        })
        .collect()
}

fn convert_tools(tools: Vec<ToolDefinition>) -> Vec<OpenAITool> {
    tools
        .into_iter()
        .map(|t| OpenAITool {
            r#type: "function",
            function: OpenAIFunctionDef {
                name: t.name,
                description: t.description,
                parameters: t.parameters,
            },
        })
        .collect()
}

fn convert_response(response: OpenAIResponse) -> LLMResponse {
    let (content, tool_calls) = match response.choices.into_iter().next() {
        Some(choice) => {
            let tool_calls: Vec<LLMToolCall> = choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| LLMToolCall::new(&tc.id, &tc.function.name, &tc.function.arguments))
                .collect();
            (choice.message.content.unwrap_or_default(), tool_calls)
        }
        None => (String::new(), Vec::new()),
    };

    let llm_response = LLMResponse::with_tools(&content, tool_calls);
    match response.usage {
        Some(u) => llm_response.with_usage(Usage::new(u.prompt_tokens, u.completion_tokens)),
        None => llm_response,
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else {
        ProviderError::Network(err.to_string())
    }
}

// ============================================================================
// LLMProvider
// ============================================================================

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat(
        &self,
        turns: Vec<Turn>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let model = model.unwrap_or(&self.default_model);
        let request = OpenAIRequest {
            model: model.to_string(),
            messages: convert_turns(turns),
            tools: (!tools.is_empty()).then(|| convert_tools(tools)),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        debug!(provider = %self.name, model = %model, messages = request.messages.len(), "Sending chat request");

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .json(&request);
        if let Some(key) = options.api_key.as_ref() {
            builder = builder.bearer_auth(key.expose());
        }

        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<OpenAIErrorResponse>(&body) {
                Ok(parsed) => match parsed.error.r#type {
                    Some(kind) => format!("{}: {}", kind, parsed.error.message),
                    None => parsed.error.message,
                },
                Err(_) => body,
            };
            return Err(parse_provider_error(status.as_u16(), &message).into());
        }

        let parsed: OpenAIResponse = response.json().await.map_err(|e| {
            ProviderError::Unknown(format!("failed to parse chat response: {}", e))
        })?;

        info!(provider = %self.name, model = %model, "Chat response received");
        Ok(convert_response(parsed))
    }

    /// Any HTTP answer from `GET /models` counts as reachable, including 401.
    async fn health_check(&self) -> bool {
        let probe = self
            .client
            .get(format!("{}/models", self.api_base))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        match probe {
            Ok(response) => !response.status().is_server_error(),
            Err(e) => {
                debug!(provider = %self.name, error = %e, "Health probe failed");
                false
            }
        }
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn requires_api_key(&self) -> bool {
        self.requires_key
    }
}
