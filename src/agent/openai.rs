//! OpenAI-compatible chat completions client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::model::{ChatMessage, ChatModel, ModelError, ModelRequest, ModelTurn, ToolCall};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiChatModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiChatModel {
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<&str>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            temperature,
            max_tokens,
            timeout,
        }
    }

    fn build_body(&self, request: &ModelRequest<'_>) -> WireRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(WireMessage::text("system", request.instructions));
        messages.extend(request.messages.iter().map(WireMessage::from));

        let tools = request
            .tools
            .iter()
            .map(|spec| WireTool {
                r#type: "function",
                function: WireFunction {
                    name: spec.name.as_str().to_string(),
                    description: spec.description.to_string(),
                    parameters: spec.parameters.clone(),
                },
            })
            .collect();

        WireRequest {
            model: request
                .settings
                .model
                .clone()
                .unwrap_or_else(|| self.model.clone()),
            messages,
            tools,
            temperature: request.settings.temperature.unwrap_or(self.temperature),
            max_tokens: request.settings.max_tokens.unwrap_or(self.max_tokens),
        }
    }
}

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireMessageToolCall>>,
}

impl WireMessage {
    fn text(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            tool_call_id: None,
            tool_calls: None,
        }
    }
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        match message {
            ChatMessage::User(content) => WireMessage::text("user", content),
            ChatMessage::Assistant {
                content,
                tool_calls,
            } => WireMessage {
                role: "assistant",
                content: content.clone(),
                tool_call_id: None,
                tool_calls: (!tool_calls.is_empty()).then(|| {
                    tool_calls
                        .iter()
                        .map(|call| WireMessageToolCall {
                            id: call.id.clone(),
                            r#type: "function",
                            function: WireCallFunction {
                                name: call.name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        })
                        .collect()
                }),
            },
            ChatMessage::Tool {
                tool_call_id,
                content,
            } => WireMessage {
                role: "tool",
                content: Some(content.clone()),
                tool_call_id: Some(tool_call_id.clone()),
                tool_calls: None,
            },
        }
    }
}

#[derive(Serialize)]
struct WireMessageToolCall {
    id: String,
    r#type: &'static str,
    function: WireCallFunction,
}

#[derive(Serialize, Deserialize)]
struct WireCallFunction {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct WireTool {
    r#type: &'static str,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireResponseToolCall>>,
}

#[derive(Deserialize)]
struct WireResponseToolCall {
    id: String,
    function: WireCallFunction,
}

/// Turn the first choice into a [`ModelTurn`]
fn parse_response(body: &str) -> Result<ModelTurn, ModelError> {
    let response: WireResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Malformed(e.to_string()))?;
    let message = response
        .choices
        .into_iter()
        .next()
        .ok_or(ModelError::Empty)?
        .message;

    let calls: Vec<ToolCall> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            // Some endpoints send "" for argument-less calls
            let arguments = if call.function.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
                    warn!(tool = %call.function.name, error = %e, "Tool arguments are not JSON");
                    Value::String(call.function.arguments.clone())
                })
            };
            ToolCall {
                id: call.id,
                name: call.function.name,
                arguments,
            }
        })
        .collect();

    if calls.is_empty() {
        Ok(ModelTurn::Final(message.content.unwrap_or_default()))
    } else {
        Ok(ModelTurn::ToolCalls {
            content: message.content.filter(|c| !c.trim().is_empty()),
            calls,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelTurn, ModelError> {
        let body = self.build_body(&request);
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            model = %body.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Calling chat model"
        );

        let send = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| ModelError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| ModelError::Http(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ModelError::Http(e.to_string()))?;
        if !status.is_success() {
            error!(status = %status, body = %text, "Chat model API error");
            return Err(ModelError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        parse_response(&text)
    }
}
