//! Anthropic Messages API backend with `tool_use` / `tool_result` blocks.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::streaming::{decode_utf8_streaming, make_final_chunk, make_text_chunk, sse_data};
use crate::{
    CompletionChunk, CompletionRequest, CompletionResponse, CompletionStream, LLMProvider, Message,
    MessageRole, Tool, ToolCall, Usage,
};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContent {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Debug, Serialize)]
struct AnthropicTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl From<&AnthropicUsage> for Usage {
    fn from(usage: &AnthropicUsage) -> Self {
        Usage {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: usage.input_tokens + usage.output_tokens,
        }
    }
}

// Streaming event structures
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart { message: StreamMessageStart },
    ContentBlockStart { index: usize, content_block: StreamBlockStart },
    ContentBlockDelta { index: usize, delta: StreamDelta },
    ContentBlockStop { index: usize },
    MessageDelta { delta: StreamMessageDelta, #[serde(default)] usage: AnthropicUsage },
    MessageStop,
    Ping,
    Error { error: StreamError },
}

#[derive(Debug, Deserialize)]
struct StreamMessageStart {
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamBlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse { id: String, name: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamMessageDelta {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

#[derive(Debug)]
struct PendingToolUse {
    index: usize,
    id: String,
    name: String,
    input_json: String,
}

impl AnthropicProvider {
    pub fn new(
        api_key: String,
        model: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("Provider 'anthropic' has no API key");
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key,
            model: model.unwrap_or_else(|| "claude-3-5-sonnet-latest".to_string()),
            base_url: ANTHROPIC_API_BASE.to_string(),
            max_tokens,
            temperature,
        })
    }

    fn create_request<'a>(&'a self, request: &'a CompletionRequest, stream: bool) -> AnthropicRequest<'a> {
        let (system, messages) = convert_messages(&request.messages);
        AnthropicRequest {
            model: request.model.as_deref().unwrap_or(&self.model),
            max_tokens: request.max_tokens.unwrap_or_else(|| self.max_tokens()),
            messages,
            system,
            temperature: request.temperature.or(self.temperature),
            tools: convert_tools(request.tools.as_deref().unwrap_or_default()),
            stream,
        }
    }

    async fn send(&self, body: &AnthropicRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Anthropic API error {}: {}", status, error_text);
        }

        Ok(response)
    }

    async fn parse_streaming_response(
        mut stream: impl futures_util::Stream<Item = reqwest::Result<Bytes>> + Unpin,
        tx: mpsc::Sender<Result<CompletionChunk>>,
    ) {
        let mut byte_buffer: Vec<u8> = Vec::new();
        let mut buffer = String::new();
        let mut usage = Usage::default();
        let mut stop_reason: Option<String> = None;
        let mut pending: Vec<PendingToolUse> = Vec::new();
        let mut finished: Vec<ToolCall> = Vec::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = match chunk_result {
                Ok(chunk) => chunk,
                Err(e) => {
                    error!("Stream error: {}", e);
                    let _ = tx.send(Err(anyhow::anyhow!("Stream error: {}", e))).await;
                    return;
                }
            };

            byte_buffer.extend_from_slice(&chunk);
            if let Some(text) = decode_utf8_streaming(&mut byte_buffer) {
                buffer.push_str(&text);
            }

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer.drain(..line_end + 1);

                let Some(data) = sse_data(&line) else {
                    continue;
                };

                let event = match serde_json::from_str::<StreamEvent>(data) {
                    Ok(event) => event,
                    Err(e) => {
                        debug!("Failed to parse stream event: {} - Data: {}", e, data);
                        continue;
                    }
                };

                match event {
                    StreamEvent::MessageStart { message } => {
                        usage.prompt_tokens = message.usage.input_tokens;
                    }
                    StreamEvent::ContentBlockStart { index, content_block } => match content_block {
                        StreamBlockStart::ToolUse { id, name } => pending.push(PendingToolUse {
                            index,
                            id,
                            name,
                            input_json: String::new(),
                        }),
                        StreamBlockStart::Text { text } if !text.is_empty() => {
                            if tx.send(Ok(make_text_chunk(text))).await.is_err() {
                                return;
                            }
                        }
                        _ => {}
                    },
                    StreamEvent::ContentBlockDelta { index, delta } => match delta {
                        StreamDelta::TextDelta { text } => {
                            if tx.send(Ok(make_text_chunk(text))).await.is_err() {
                                debug!("Receiver dropped, stopping stream");
                                return;
                            }
                        }
                        StreamDelta::InputJsonDelta { partial_json } => {
                            if let Some(tool) = pending.iter_mut().find(|t| t.index == index) {
                                tool.input_json.push_str(&partial_json);
                            }
                        }
                        StreamDelta::Other => {}
                    },
                    StreamEvent::ContentBlockStop { index } => {
                        if let Some(pos) = pending.iter().position(|t| t.index == index) {
                            let tool = pending.remove(pos);
                            let arguments = if tool.input_json.trim().is_empty() {
                                "{}".to_string()
                            } else {
                                tool.input_json
                            };
                            finished.push(ToolCall {
                                id: tool.id,
                                name: tool.name,
                                arguments,
                            });
                        }
                    }
                    StreamEvent::MessageDelta { delta, usage: delta_usage } => {
                        stop_reason = delta.stop_reason;
                        usage.completion_tokens = delta_usage.output_tokens;
                        usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;
                    }
                    StreamEvent::MessageStop => {
                        let _ = tx
                            .send(Ok(make_final_chunk(finished, Some(usage), stop_reason)))
                            .await;
                        return;
                    }
                    StreamEvent::Ping => {}
                    StreamEvent::Error { error } => {
                        let _ = tx
                            .send(Err(anyhow::anyhow!("Anthropic stream error: {}", error.message)))
                            .await;
                        return;
                    }
                }
            }
        }

        let _ = tx
            .send(Ok(make_final_chunk(finished, Some(usage), stop_reason)))
            .await;
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!(
            "Processing Anthropic completion request with {} messages",
            request.messages.len()
        );

        let body = self.create_request(&request, false);
        let response: AnthropicResponse = self.send(&body).await?.json().await?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in response.content {
            match block {
                AnthropicContent::Text { text } => content.push_str(&text),
                AnthropicContent::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id,
                    name,
                    arguments: input.to_string(),
                }),
                AnthropicContent::ToolResult { .. } => {}
            }
        }

        let usage = Usage::from(&response.usage);
        debug!(
            "Anthropic completion successful: {} tokens generated, {} tool calls",
            usage.completion_tokens,
            tool_calls.len()
        );

        Ok(CompletionResponse {
            content,
            tool_calls,
            usage,
            model: body.model.to_string(),
            stop_reason: response.stop_reason,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        debug!(
            "Processing Anthropic streaming request with {} messages",
            request.messages.len()
        );

        let body = self.create_request(&request, true);
        let response = self.send(&body).await?;

        let stream = response.bytes_stream();
        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(Self::parse_streaming_response(stream, tx));

        Ok(ReceiverStream::new(rx))
    }

    fn name(&self) -> &str {
        "anthropic"
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

/// Split out the system prompt and group turns into alternating user/assistant
/// messages. Tool results travel inside user turns.
fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut converted: Vec<AnthropicMessage> = Vec::new();

    for message in messages {
        let (role, blocks) = match message.role {
            MessageRole::System => {
                system_parts.push(&message.content);
                continue;
            }
            MessageRole::User => ("user", vec![AnthropicContent::Text { text: message.content.clone() }]),
            MessageRole::Tool => (
                "user",
                vec![AnthropicContent::ToolResult {
                    tool_use_id: message.tool_call_id.clone().unwrap_or_default(),
                    content: message.content.clone(),
                }],
            ),
            MessageRole::Assistant => {
                let mut blocks = Vec::new();
                if !message.content.is_empty() {
                    blocks.push(AnthropicContent::Text { text: message.content.clone() });
                }
                for call in &message.tool_calls {
                    let input = serde_json::from_str(&call.arguments)
                        .unwrap_or_else(|_| Value::Object(Default::default()));
                    blocks.push(AnthropicContent::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input,
                    });
                }
                if blocks.is_empty() {
                    // The Messages API rejects an empty content array
                    continue;
                }
                ("assistant", blocks)
            }
        };

        match converted.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => converted.push(AnthropicMessage { role, content: blocks }),
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, converted)
}

fn convert_tools(tools: &[Tool]) -> Vec<AnthropicTool<'_>> {
    tools
        .iter()
        .map(|tool| AnthropicTool {
            name: &tool.name,
            description: &tool.description,
            input_schema: &tool.input_schema,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_consecutive_tool_results_share_one_user_turn() {
        let messages = vec![
            Message::system("be terse"),
            Message::user("edit both"),
            Message::assistant(
                "",
                vec![
                    ToolCall::new("t1", "text_editor", &json!({"command": "view", "path": "a"})),
                    ToolCall::new("t2", "text_editor", &json!({"command": "view", "path": "b"})),
                ],
            ),
            Message::tool_result("t1", "A"),
            Message::tool_result("t2", "B"),
        ];

        let (system, converted) = convert_messages(&messages);
        assert_eq!(system.as_deref(), Some("be terse"));
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[1].role, "assistant");
        assert_eq!(converted[1].content.len(), 2);
        assert_eq!(converted[2].role, "user");
        assert_eq!(converted[2].content.len(), 2);

        let wire = serde_json::to_value(&converted[2].content[0]).unwrap();
        assert_eq!(wire["type"], "tool_result");
        assert_eq!(wire["tool_use_id"], "t1");
    }

    #[test]
    fn test_empty_assistant_turn_is_skipped() {
        let messages = vec![
            Message::user("hello"),
            Message::assistant("", vec![]),
            Message::user("still there?"),
        ];

        let (_, converted) = convert_messages(&messages);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[0].content.len(), 2);
        assert!(converted.iter().all(|m| !m.content.is_empty()));
    }

    #[test]
    fn test_stream_events_parse() {
        let start: StreamEvent = serde_json::from_str(
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"text_editor","input":{}}}"#,
        )
        .unwrap();
        assert!(matches!(
            start,
            StreamEvent::ContentBlockStart { index: 1, content_block: StreamBlockStart::ToolUse { .. } }
        ));

        let delta: StreamEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"path\""}}"#,
        )
        .unwrap();
        assert!(matches!(
            delta,
            StreamEvent::ContentBlockDelta { delta: StreamDelta::InputJsonDelta { .. }, .. }
        ));
    }
}
