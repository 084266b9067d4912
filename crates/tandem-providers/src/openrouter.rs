//! OpenRouter backend: a raw HTTP chat endpoint without tool calling.
//!
//! Requests carry the `HTTP-Referer` and `X-Title` attribution headers
//! OpenRouter uses to identify the calling application.

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
    MessageRole, Usage,
};

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Clone)]
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    model: String,
    api_url: String,
    http_referer: String,
    x_title: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl OpenRouterProvider {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api_key: String,
        model: Option<String>,
        http_referer: Option<String>,
        x_title: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("Provider 'openrouter' has no API key");
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key,
            model: model.unwrap_or_else(|| "openai/gpt-4o".to_string()),
            api_url: OPENROUTER_API_URL.to_string(),
            http_referer: http_referer.unwrap_or_default(),
            x_title: x_title.unwrap_or_else(|| "tandem".to_string()),
            max_tokens,
            temperature,
        })
    }

    fn create_request_body(&self, request: &CompletionRequest, stream: bool) -> serde_json::Value {
        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.model),
            "messages": convert_messages(&request.messages),
        });

        if stream {
            body["stream"] = json!(true);
        }
        if let Some(max_tokens) = request.max_tokens.or(self.max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = request.temperature.or(self.temperature) {
            body["temperature"] = json!(temperature);
        }

        body
    }

    async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.http_referer)
            .header("X-Title", &self.x_title)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("OpenRouter API error {}: {}", status, error_text);
        }

        Ok(response)
    }
}

/// Plain role/content pairs; tool turns never reach this endpoint.
fn convert_messages(messages: &[Message]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .filter_map(|msg| {
            let role = match msg.role {
                MessageRole::System => "system",
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
                MessageRole::Tool => return None,
            };
            Some(json!({"role": role, "content": msg.content}))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    delta: Option<ChatMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ChatUsage> for Usage {
    fn from(usage: ChatUsage) -> Self {
        Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

async fn process_stream(
    mut stream: impl futures_util::Stream<Item = reqwest::Result<Bytes>> + Unpin,
    tx: mpsc::Sender<Result<CompletionChunk>>,
) {
    let mut byte_buffer: Vec<u8> = Vec::new();
    let mut buffer = String::new();
    let mut usage: Option<Usage> = None;
    let mut stop_reason: Option<String> = None;

    while let Some(chunk_result) = stream.next().await {
        let chunk = match chunk_result {
            Ok(chunk) => chunk,
            Err(e) => {
                error!("OpenRouter stream error: {}", e);
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

            // OpenRouter interleaves ": OPENROUTER PROCESSING" keep-alive comments
            let Some(data) = sse_data(&line) else {
                continue;
            };
            if data == "[DONE]" {
                let _ = tx.send(Ok(make_final_chunk(Vec::new(), usage, stop_reason))).await;
                return;
            }

            match serde_json::from_str::<ChatResponse>(data) {
                Ok(parsed) => {
                    if let Some(u) = parsed.usage {
                        usage = Some(u.into());
                    }
                    for choice in parsed.choices {
                        if choice.finish_reason.is_some() {
                            stop_reason = choice.finish_reason;
                        }
                        let content = choice.delta.and_then(|d| d.content).unwrap_or_default();
                        if !content.is_empty() && tx.send(Ok(make_text_chunk(content))).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => debug!("Failed to parse OpenRouter chunk: {} - Data: {}", e, data),
            }
        }
    }

    let _ = tx.send(Ok(make_final_chunk(Vec::new(), usage, stop_reason))).await;
}

#[async_trait]
impl LLMProvider for OpenRouterProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!(
            "Processing OpenRouter completion request with {} messages",
            request.messages.len()
        );

        let body = self.create_request_body(&request, false);
        let parsed: ChatResponse = self.send(&body).await?.json().await?;

        let choice = parsed.choices.into_iter().next();
        let stop_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let content = choice
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            tool_calls: Vec::new(),
            usage: parsed.usage.map(Into::into).unwrap_or_default(),
            model: request.model.unwrap_or_else(|| self.model.clone()),
            stop_reason,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let body = self.create_request_body(&request, true);
        let response = self.send(&body).await?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(process_stream(response.bytes_stream(), tx));

        Ok(ReceiverStream::new(rx))
    }

    fn name(&self) -> &str {
        "openrouter"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(1000)
    }

    fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_messages_are_not_sent() {
        let messages = vec![
            Message::user("hello"),
            Message::tool_result("x", "should vanish"),
            Message::assistant("hi", vec![]),
        ];
        let converted = convert_messages(&messages);
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[1]["role"], "assistant");
    }

    #[test]
    fn test_request_body_has_no_tools() {
        let provider =
            OpenRouterProvider::new("key".to_string(), None, None, None, None, None, None).unwrap();
        let mut request = CompletionRequest::new(vec![Message::user("hi")]);
        request.tools = Some(vec![]);

        let body = provider.create_request_body(&request, true);
        assert!(body.get("tools").is_none());
        assert_eq!(body["stream"], true);
        assert_eq!(body["model"], "openai/gpt-4o");
    }
}
