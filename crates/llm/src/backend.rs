//! OpenAI-compatible chat completions backend with tool calling.

use async_trait::async_trait;
use leasing_agent_core::{
    FinishReason, GenerateRequest, GenerateResponse, LanguageModel, LlmError, Message, Role,
    ToolCallRequest, ToolDefinition,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Backend configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    /// Base URL of an OpenAI-compatible server
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            endpoint: "https://api.openai.com".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

impl From<&leasing_agent_config::LlmSettings> for LlmConfig {
    fn from(settings: &leasing_agent_config::LlmSettings) -> Self {
        Self {
            model: settings.model.clone(),
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            ..Self::default()
        }
    }
}

/// Chat completions client. Retries transport errors and 5xx responses
/// with doubling backoff; 4xx responses fail immediately.
pub struct OpenAiBackend {
    config: LlmConfig,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    fn build_body(&self, request: &GenerateRequest, tools: &[ToolDefinition]) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: request.messages.iter().map(ChatMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools: tools.iter().map(ChatTool::from).collect(),
        }
    }

    async fn send_once(&self, body: &ChatRequest) -> Result<ChatResponse, SendError> {
        let mut builder = self.client.post(self.completions_url()).json(body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SendError::Fatal(LlmError::Timeout(self.config.timeout.as_secs()))
            } else {
                SendError::Retryable(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(SendError::Retryable(format!("server returned {status}")));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SendError::Fatal(LlmError::Request(format!(
                "request rejected with {status}: {detail}"
            ))));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| SendError::Fatal(LlmError::InvalidResponse(e.to_string())))
    }

    fn parse_response(&self, response: ChatResponse) -> Result<GenerateResponse, LlmError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

        let mut tool_calls = Vec::with_capacity(choice.message.tool_calls.len());
        for call in choice.message.tool_calls {
            let arguments = serde_json::from_str(&call.function.arguments).map_err(|e| {
                LlmError::InvalidResponse(format!(
                    "tool call arguments are not valid JSON: {e}"
                ))
            })?;
            tool_calls.push(ToolCallRequest {
                call_id: call.id,
                name: call.function.name,
                arguments,
            });
        }

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("length") => FinishReason::Length,
            Some("stop") | None => {
                if tool_calls.is_empty() {
                    FinishReason::Stop
                } else {
                    FinishReason::ToolCalls
                }
            }
            Some(other) => {
                debug!(finish_reason = other, "unrecognized finish reason");
                FinishReason::Stop
            }
        };

        Ok(GenerateResponse {
            text: choice.message.content.unwrap_or_default(),
            tool_calls,
            finish_reason,
        })
    }
}

enum SendError {
    Retryable(String),
    Fatal(LlmError),
}

#[async_trait]
impl LanguageModel for OpenAiBackend {
    async fn generate_with_tools(
        &self,
        request: GenerateRequest,
        tools: &[ToolDefinition],
    ) -> Result<GenerateResponse, LlmError> {
        let body = self.build_body(&request, tools);

        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0;
        loop {
            match self.send_once(&body).await {
                Ok(response) => return self.parse_response(response),
                Err(SendError::Fatal(e)) => return Err(e),
                Err(SendError::Retryable(reason)) => {
                    attempt += 1;
                    if attempt >= self.config.max_retries {
                        return Err(LlmError::Request(format!(
                            "request failed after {attempt} attempts: {reason}"
                        )));
                    }
                    warn!(attempt, %reason, "retrying chat completion");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// Wire format

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ChatToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        Self {
            role: role.to_string(),
            content: if message.content.is_empty() && !message.tool_calls.is_empty() {
                None
            } else {
                Some(message.content.clone())
            },
            tool_calls: message.tool_calls.iter().map(ChatToolCall::from).collect(),
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    kind: String,
    function: ChatFunctionDef,
}

#[derive(Debug, Serialize)]
struct ChatFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolDefinition> for ChatTool {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            kind: "function".to_string(),
            function: ChatFunctionDef {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: ChatFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

impl From<&ToolCallRequest> for ChatToolCall {
    fn from(call: &ToolCallRequest) -> Self {
        Self {
            id: call.call_id.clone(),
            kind: "function".to_string(),
            function: ChatFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatFunctionCall {
    name: String,
    /// JSON-encoded arguments, as the API ships them
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}
