//! Google Gemini backend.
//!
//! Single-shot inference through `generateContent`. Gemini is registered
//! without tool calling: tool schemas are never sent and responses never
//! carry tool calls, so the tool-call loop finishes after one round trip.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::streaming::{decode_utf8_streaming, make_final_chunk, make_text_chunk, sse_data};
use crate::{
    CompletionChunk, CompletionRequest, CompletionResponse, CompletionStream, LLMProvider, Message,
    MessageRole, Usage,
};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: f32,
}

impl GeminiProvider {
    pub fn new(
        api_key: String,
        model: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("Provider 'gemini' has no API key");
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key,
            model: model.unwrap_or_else(|| "gemini-1.5-pro".to_string()),
            max_tokens,
            temperature: temperature.unwrap_or(0.5),
        })
    }

    fn api_url(&self, model: &str, stream: bool) -> String {
        if stream {
            format!(
                "{}/models/{}:streamGenerateContent?alt=sse&key={}",
                GEMINI_API_BASE, model, self.api_key
            )
        } else {
            format!("{}/models/{}:generateContent?key={}", GEMINI_API_BASE, model, self.api_key)
        }
    }

    fn build_request(&self, request: &CompletionRequest) -> GeminiRequest {
        let (contents, system_instruction) = convert_messages(&request.messages);
        GeminiRequest {
            contents,
            system_instruction,
            generation_config: GeminiGenerationConfig {
                max_output_tokens: request.max_tokens.or(self.max_tokens),
                temperature: request.temperature.or(Some(self.temperature)),
            },
        }
    }

    async fn send(&self, url: &str, body: &GeminiRequest) -> Result<reqwest::Response> {
        let response = self.client.post(url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error ({}): {}", status, error_text);
            anyhow::bail!("Gemini API error ({}): {}", status, error_text);
        }

        Ok(response)
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

impl GeminiResponse {
    fn text(&self) -> String {
        self.candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default()
    }

    fn finish_reason(&self) -> Option<String> {
        self.candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.finish_reason.clone())
    }

    fn usage(&self) -> Usage {
        match &self.usage_metadata {
            Some(meta) => Usage {
                prompt_tokens: meta.prompt_token_count.unwrap_or(0),
                completion_tokens: meta.candidates_token_count.unwrap_or(0),
                total_tokens: meta.total_token_count.unwrap_or(0),
            },
            None => Usage::default(),
        }
    }
}

/// Gemini uses "model" for assistant turns and a separate system instruction.
/// Tool traffic has no meaning for this backend and is dropped.
fn convert_messages(messages: &[Message]) -> (Vec<GeminiContent>, Option<GeminiContent>) {
    let mut contents = Vec::new();
    let mut system_parts = Vec::new();

    for msg in messages {
        let role = match msg.role {
            MessageRole::System => {
                system_parts.push(GeminiPart { text: msg.content.clone() });
                continue;
            }
            MessageRole::User => "user",
            MessageRole::Assistant => "model",
            MessageRole::Tool => continue,
        };

        if msg.content.is_empty() {
            continue;
        }

        contents.push(GeminiContent {
            role: Some(role.to_string()),
            parts: vec![GeminiPart { text: msg.content.clone() }],
        });
    }

    let system_instruction = if system_parts.is_empty() {
        None
    } else {
        Some(GeminiContent { role: None, parts: system_parts })
    };

    (contents, system_instruction)
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
                error!("Gemini stream error: {}", e);
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

            match serde_json::from_str::<GeminiResponse>(data) {
                Ok(response) => {
                    let text = response.text();
                    if response.usage_metadata.is_some() {
                        usage = Some(response.usage());
                    }
                    if let Some(reason) = response.finish_reason() {
                        stop_reason = Some(reason);
                    }
                    if !text.is_empty() && tx.send(Ok(make_text_chunk(text))).await.is_err() {
                        debug!("Receiver dropped, stopping stream");
                        return;
                    }
                }
                Err(e) => debug!("Failed to parse Gemini chunk: {} - Data: {}", e, data),
            }
        }
    }

    let _ = tx.send(Ok(make_final_chunk(Vec::new(), usage, stop_reason))).await;
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let body = self.build_request(&request);
        debug!("Gemini completion request: model={}, {} contents", model, body.contents.len());

        let gemini_response: GeminiResponse = self.send(&self.api_url(&model, false), &body).await?.json().await?;

        Ok(CompletionResponse {
            content: gemini_response.text(),
            tool_calls: Vec::new(),
            usage: gemini_response.usage(),
            model,
            stop_reason: gemini_response.finish_reason(),
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let body = self.build_request(&request);
        debug!("Gemini streaming request: model={}", model);

        let response = self.send(&self.api_url(&model, true), &body).await?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(process_stream(response.bytes_stream(), tx));

        Ok(ReceiverStream::new(rx))
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(8192)
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolCall;

    #[test]
    fn test_convert_messages_drops_tool_traffic() {
        let messages = vec![
            Message::system("You analyze projects."),
            Message::user("Analyze"),
            Message::assistant("", vec![ToolCall::new("x", "text_editor", &serde_json::json!({}))]),
            Message::tool_result("x", "ignored"),
            Message::assistant("Looks fine", vec![]),
        ];

        let (contents, system) = convert_messages(&messages);
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
        assert_eq!(contents[1].role.as_deref(), Some("model"));
        assert_eq!(system.unwrap().parts[0].text, "You analyze projects.");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"a"},{"text":"b"}]},"finishReason":"STOP"}],
                "usageMetadata":{"promptTokenCount":3,"candidatesTokenCount":2,"totalTokenCount":5}}"#,
        )
        .unwrap();

        assert_eq!(response.text(), "ab");
        assert_eq!(response.finish_reason().as_deref(), Some("STOP"));
        assert_eq!(response.usage().total_tokens, 5);
    }

    #[test]
    fn test_gemini_never_claims_tool_calling() {
        let provider = GeminiProvider::new("key".to_string(), None, None, None, None).unwrap();
        assert!(!provider.has_native_tool_calling());
        assert!(provider.api_url("gemini-1.5-pro", true).contains("alt=sse"));
    }
}
