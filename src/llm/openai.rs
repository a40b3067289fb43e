//! OpenAI-compatible chat completion client
//!
//! Works against any server exposing `/chat/completions` with function
//! calling (OpenAI, LM Studio, llama.cpp server, vLLM).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, Completion, CompletionBackend, Role, ToolCall, ToolFunction};
use crate::config::LlmConfig;
use crate::{Error, Result};

/// HTTP client for an OpenAI-compatible completion endpoint
pub struct OpenAiClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiClient {
    /// Create a client from LLM configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Self::with_timeout(
            config.api_base.clone(),
            config.api_key.clone(),
            config.model.clone(),
            config.timeout,
        )
    }

    /// Create a client for an explicit endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn with_timeout(
        api_base: String,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model,
        })
    }

    /// Model identifier sent with each request
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        tools: Option<&'a [ToolFunction]>,
        temperature: f32,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            tools: tools
                .filter(|t| !t.is_empty())
                .map(|t| t.iter().map(WireTool::from).collect()),
            temperature,
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn get_completion(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolFunction]>,
        temperature: f32,
    ) -> Result<Completion> {
        let body = self.request_body(messages, tools, temperature);
        let url = format!("{}/chat/completions", self.api_base);

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.map_or(0, <[ToolFunction]>::len),
            "requesting completion"
        );

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "completion request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "completion API error");
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        parse_completion(&text)
    }
}

/// Interpret a chat completion response body
///
/// # Errors
///
/// Returns error if the body is not JSON or has no usable choice
pub fn parse_completion(body: &str) -> Result<Completion> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("invalid JSON: {e}")))?;

    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| Error::MalformedResponse("no choices in response".to_string()))?;

    let calls: Vec<ToolCall> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, call)| {
            let arguments = match call.function.arguments {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => "{}".to_string(),
                other => other.to_string(),
            };
            let id = call
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{i}"));
            ToolCall::function(id, call.function.name, arguments)
        })
        .collect();

    if !calls.is_empty() {
        return Ok(Completion::ToolCalls(calls));
    }

    message
        .content
        .map(Completion::Text)
        .ok_or_else(|| Error::MalformedResponse("message has neither content nor tool calls".to_string()))
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        // Function-call turns go out in the `tool_calls` shape with null content
        if let Some(call) = &msg.function_call {
            return Self {
                role: msg.role,
                content: None,
                tool_calls: Some(vec![WireToolCall {
                    id: &call.id,
                    kind: "function",
                    function: WireFunction {
                        name: &call.name,
                        arguments: &call.arguments,
                    },
                }]),
                tool_call_id: None,
                name: None,
            };
        }

        Self {
            role: msg.role,
            content: Some(&msg.content),
            tool_calls: None,
            tool_call_id: msg.tool_call_id.as_deref(),
            name: msg.name.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolFunction,
}

impl<'a> From<&'a ToolFunction> for WireTool<'a> {
    fn from(function: &'a ToolFunction) -> Self {
        Self {
            kind: "function",
            function,
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    id: Option<String>,
    function: ResponseFunction,
}

#[derive(Deserialize)]
struct ResponseFunction {
    name: String,
    // Some local servers send an object instead of a JSON string
    #[serde(default)]
    arguments: serde_json::Value,
}
