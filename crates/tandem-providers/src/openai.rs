use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::streaming::{decode_utf8_streaming, make_final_chunk, make_text_chunk, sse_data};
use crate::{
    CompletionChunk, CompletionRequest, CompletionResponse, CompletionStream, LLMProvider, Message,
    MessageRole, Tool, ToolCall, Usage,
};

/// Chat-completions backend with structured tool calling.
///
/// Also serves OpenAI-compatible endpoints (Groq, Mistral, ...) through
/// [`OpenAIProvider::new_with_name`] and a custom `base_url`.
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    name: String,
}

impl OpenAIProvider {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        Self::new_with_name(
            "openai".to_string(),
            api_key,
            model,
            base_url,
            max_tokens,
            temperature,
            timeout,
        )
    }

    pub fn new_with_name(
        name: String,
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("Provider '{}' has no API key", name);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key,
            model: model.unwrap_or_else(|| "gpt-4o".to_string()),
            base_url: base_url
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            max_tokens,
            temperature,
            name,
        })
    }

    fn create_request_body(&self, request: &CompletionRequest, stream: bool) -> serde_json::Value {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let mut body = json!({
            "model": model,
            "messages": convert_messages(&request.messages),
            "stream": stream,
        });

        if let Some(max_tokens) = request.max_tokens.or(self.max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(temperature) = request.temperature.or(self.temperature) {
            body["temperature"] = json!(temperature);
        }

        if let Some(tools) = request.tools.as_deref() {
            if !tools.is_empty() {
                body["tools"] = json!(convert_tools(tools));
            }
        }

        if stream {
            body["stream_options"] = json!({
                "include_usage": true,
            });
        }

        body
    }

    async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("{} API error {}: {}", self.name, status, error_text);
        }

        Ok(response)
    }

    async fn parse_streaming_response(
        &self,
        mut stream: impl futures_util::Stream<Item = reqwest::Result<Bytes>> + Unpin,
        tx: mpsc::Sender<Result<CompletionChunk>>,
    ) -> Option<Usage> {
        let mut byte_buffer: Vec<u8> = Vec::new();
        let mut buffer = String::new();
        let mut accumulated_usage: Option<Usage> = None;
        let mut stop_reason: Option<String> = None;
        let mut current_tool_calls: Vec<OpenAIStreamingToolCall> = Vec::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = match chunk_result {
                Ok(chunk) => chunk,
                Err(e) => {
                    error!("Stream error: {}", e);
                    let _ = tx.send(Err(anyhow::anyhow!("Stream error: {}", e))).await;
                    return accumulated_usage;
                }
            };

            byte_buffer.extend_from_slice(&chunk);
            if let Some(text) = decode_utf8_streaming(&mut byte_buffer) {
                buffer.push_str(&text);
            }

            // Process complete lines
            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer.drain(..line_end + 1);

                let Some(data) = sse_data(&line) else {
                    continue;
                };

                if data == "[DONE]" {
                    debug!("Received stream completion marker");
                    let tool_calls = finish_tool_calls(&current_tool_calls);
                    let _ = tx
                        .send(Ok(make_final_chunk(tool_calls, accumulated_usage.clone(), stop_reason)))
                        .await;
                    return accumulated_usage;
                }

                let chunk_data = match serde_json::from_str::<OpenAIStreamChunk>(data) {
                    Ok(chunk_data) => chunk_data,
                    Err(e) => {
                        debug!("Failed to parse stream chunk: {} - Data: {}", e, data);
                        continue;
                    }
                };

                for choice in chunk_data.choices {
                    if let Some(content) = choice.delta.content {
                        if !content.is_empty() && tx.send(Ok(make_text_chunk(content))).await.is_err() {
                            debug!("Receiver dropped, stopping stream");
                            return accumulated_usage;
                        }
                    }

                    for delta in choice.delta.tool_calls.unwrap_or_default() {
                        let index = delta.index.unwrap_or(0);
                        while current_tool_calls.len() <= index {
                            current_tool_calls.push(OpenAIStreamingToolCall::default());
                        }

                        let tool_call = &mut current_tool_calls[index];
                        if let Some(id) = delta.id {
                            tool_call.id = Some(id);
                        }
                        if let Some(function) = delta.function {
                            if let Some(name) = function.name {
                                tool_call.name = Some(name);
                            }
                            if let Some(arguments) = function.arguments {
                                tool_call.arguments.push_str(&arguments);
                            }
                        }
                    }

                    if choice.finish_reason.is_some() {
                        stop_reason = choice.finish_reason;
                    }
                }

                if let Some(usage) = chunk_data.usage {
                    accumulated_usage = Some(usage.into());
                }
            }
        }

        // Stream ended without [DONE]
        let tool_calls = finish_tool_calls(&current_tool_calls);
        let _ = tx
            .send(Ok(make_final_chunk(tool_calls, accumulated_usage.clone(), stop_reason)))
            .await;

        accumulated_usage
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!(
            "Processing {} completion request with {} messages",
            self.name,
            request.messages.len()
        );

        let body = self.create_request_body(&request, false);
        let response = self.send(&body).await?;
        let openai_response: OpenAIResponse = response.json().await?;

        let choice = openai_response.choices.into_iter().next();
        let stop_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let (content, tool_calls) = match choice {
            Some(choice) => (
                choice.message.content.unwrap_or_default(),
                choice
                    .message
                    .tool_calls
                    .unwrap_or_default()
                    .into_iter()
                    .map(|tc| ToolCall {
                        id: tc.id,
                        name: tc.function.name,
                        arguments: tc.function.arguments,
                    })
                    .collect(),
            ),
            None => (String::new(), Vec::new()),
        };

        let usage: Usage = openai_response.usage.map(Into::into).unwrap_or_default();

        debug!(
            "{} completion successful: {} tokens generated, {} tool calls",
            self.name,
            usage.completion_tokens,
            tool_calls.len()
        );

        Ok(CompletionResponse {
            content,
            tool_calls,
            usage,
            model: request.model.unwrap_or_else(|| self.model.clone()),
            stop_reason,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        debug!(
            "Processing {} streaming request with {} messages",
            self.name,
            request.messages.len()
        );

        let body = self.create_request_body(&request, true);
        let response = self.send(&body).await?;

        let stream = response.bytes_stream();
        let (tx, rx) = mpsc::channel(100);

        let provider = self.clone();
        tokio::spawn(async move {
            if let Some(usage) = provider.parse_streaming_response(stream, tx).await {
                debug!(
                    "Stream completed with usage - prompt: {}, completion: {}, total: {}",
                    usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                );
            }
        });

        Ok(ReceiverStream::new(rx))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn has_native_tool_calling(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(1000)
    }

    fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(0.5)
    }
}

fn convert_messages(messages: &[Message]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|msg| match msg.role {
            MessageRole::System => json!({"role": "system", "content": msg.content}),
            MessageRole::User => json!({"role": "user", "content": msg.content}),
            MessageRole::Assistant if msg.has_tool_calls() => json!({
                "role": "assistant",
                "content": if msg.content.is_empty() { serde_json::Value::Null } else { json!(msg.content) },
                "tool_calls": msg.tool_calls.iter().map(|tc| json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {"name": tc.name, "arguments": tc.arguments},
                })).collect::<Vec<_>>(),
            }),
            MessageRole::Assistant => json!({"role": "assistant", "content": msg.content}),
            MessageRole::Tool => json!({
                "role": "tool",
                "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
                "content": msg.content,
            }),
        })
        .collect()
}

fn convert_tools(tools: &[Tool]) -> Vec<serde_json::Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema,
                }
            })
        })
        .collect()
}

fn finish_tool_calls(partial: &[OpenAIStreamingToolCall]) -> Vec<ToolCall> {
    partial.iter().filter_map(|tc| tc.to_tool_call()).collect()
}

// OpenAI API response structures
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

// Streaming tool call accumulator
#[derive(Debug, Default)]
struct OpenAIStreamingToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl OpenAIStreamingToolCall {
    fn to_tool_call(&self) -> Option<ToolCall> {
        Some(ToolCall {
            id: self.id.clone()?,
            name: self.name.clone()?,
            arguments: self.arguments.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<OpenAIUsage> for Usage {
    fn from(usage: OpenAIUsage) -> Self {
        Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

// Streaming response structures
#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    choices: Vec<OpenAIStreamChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAIDeltaToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIDeltaToolCall {
    index: Option<usize>,
    id: Option<String>,
    function: Option<OpenAIDeltaFunction>,
}

#[derive(Debug, Deserialize)]
struct OpenAIDeltaFunction {
    name: Option<String>,
    arguments: Option<String>,
}
