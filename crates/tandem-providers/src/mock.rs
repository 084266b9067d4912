//! Mock LLM Provider for Testing
//!
//! A scripted provider that replays a FIFO queue of responses and records
//! every request it receives. Cloning a `MockProvider` shares the queue and
//! the request log, so a test can hand one clone to the code under test and
//! keep another for assertions.
//!
//! # Example
//!
//! ```rust,ignore
//! use tandem_providers::mock::{MockProvider, MockResponse};
//!
//! let provider = MockProvider::new()
//!     .with_native_tool_calling(true)
//!     .with_responses(vec![
//!         MockResponse::tool_call("text_editor", json!({"command": "create", "path": "a.txt"})),
//!         MockResponse::text("done"),
//!     ]);
//! ```

use crate::{
    CompletionChunk, CompletionRequest, CompletionResponse, CompletionStream, LLMProvider,
    ToolCall, Usage,
};
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Global counter for generating unique tool call IDs
static TOOL_CALL_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_tool_call_id() -> String {
    format!("call_{}", TOOL_CALL_COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// A scripted response
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub chunks: Vec<MockChunk>,
    pub usage: Usage,
    /// When set, the provider call fails with this message instead of answering
    pub error: Option<String>,
}

/// A single chunk in a scripted streaming response
#[derive(Debug, Clone)]
pub struct MockChunk {
    pub content: String,
    pub finished: bool,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub stop_reason: Option<String>,
}

impl MockChunk {
    pub fn content(text: &str) -> Self {
        Self {
            content: text.to_string(),
            finished: false,
            tool_calls: None,
            stop_reason: None,
        }
    }

    pub fn finished(stop_reason: &str) -> Self {
        Self {
            content: String::new(),
            finished: true,
            tool_calls: None,
            stop_reason: Some(stop_reason.to_string()),
        }
    }

    pub fn tool_call(name: &str, args: serde_json::Value) -> Self {
        Self::raw_tool_call(name, &args.to_string())
    }

    /// Tool call whose argument text is passed through untouched (may be invalid JSON)
    pub fn raw_tool_call(name: &str, arguments: &str) -> Self {
        Self {
            content: String::new(),
            finished: false,
            tool_calls: Some(vec![ToolCall {
                id: next_tool_call_id(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }]),
            stop_reason: None,
        }
    }
}

fn usage_for(text_len: usize) -> Usage {
    let completion = text_len as u32 / 4;
    Usage {
        prompt_tokens: 100,
        completion_tokens: completion,
        total_tokens: 100 + completion,
    }
}

impl MockResponse {
    /// Text-only response (single chunk + finish)
    pub fn text(content: &str) -> Self {
        Self {
            chunks: vec![MockChunk::content(content), MockChunk::finished("end_turn")],
            usage: usage_for(content.len()),
            error: None,
        }
    }

    /// Text response split into several streamed chunks
    pub fn streaming(chunks: Vec<&str>) -> Self {
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        let mut mock_chunks: Vec<MockChunk> = chunks.into_iter().map(MockChunk::content).collect();
        mock_chunks.push(MockChunk::finished("end_turn"));

        Self {
            chunks: mock_chunks,
            usage: usage_for(total),
            error: None,
        }
    }

    /// Single native tool call
    pub fn tool_call(name: &str, args: serde_json::Value) -> Self {
        Self::tool_calls(vec![(name, args)])
    }

    /// Several tool calls issued in one turn, kept in the given order
    pub fn tool_calls(calls: Vec<(&str, serde_json::Value)>) -> Self {
        let mut chunks: Vec<MockChunk> = calls
            .into_iter()
            .map(|(name, args)| MockChunk::tool_call(name, args))
            .collect();
        chunks.push(MockChunk::finished("tool_use"));

        Self {
            chunks,
            usage: usage_for(200),
            error: None,
        }
    }

    /// Text followed by a native tool call
    pub fn text_then_tool(text: &str, name: &str, args: serde_json::Value) -> Self {
        Self {
            chunks: vec![
                MockChunk::content(text),
                MockChunk::tool_call(name, args),
                MockChunk::finished("tool_use"),
            ],
            usage: usage_for(text.len() + 200),
            error: None,
        }
    }

    /// Tool call whose arguments are not valid JSON
    pub fn malformed_tool_call(name: &str, raw_arguments: &str) -> Self {
        Self {
            chunks: vec![
                MockChunk::raw_tool_call(name, raw_arguments),
                MockChunk::finished("tool_use"),
            ],
            usage: usage_for(raw_arguments.len()),
            error: None,
        }
    }

    /// Provider failure (e.g. `"401 unauthorized"`)
    pub fn error(message: &str) -> Self {
        Self {
            chunks: Vec::new(),
            usage: Usage::default(),
            error: Some(message.to_string()),
        }
    }

    pub fn custom(chunks: Vec<MockChunk>, usage: Usage) -> Self {
        Self {
            chunks,
            usage,
            error: None,
        }
    }
}

/// A mock LLM provider for testing
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    native_tool_calling: bool,
    /// Queue of responses to return (FIFO)
    responses: Arc<Mutex<Vec<MockResponse>>>,
    /// All requests received (for verification)
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    /// Response when the queue is empty
    default_response: Option<MockResponse>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            model: "mock-model".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            native_tool_calling: false,
            responses: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            default_response: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_native_tool_calling(mut self, enabled: bool) -> Self {
        self.native_tool_calling = enabled;
        self
    }

    pub fn with_response(self, response: MockResponse) -> Self {
        self.lock_responses().push(response);
        self
    }

    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        self.lock_responses().extend(responses);
        self
    }

    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.default_response = Some(response);
        self
    }

    /// All requests made to this provider (shared across clones)
    pub fn get_requests(&self) -> Vec<CompletionRequest> {
        self.lock_requests().clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock_requests().len()
    }

    pub fn remaining_responses(&self) -> usize {
        self.lock_responses().len()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, Vec<MockResponse>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<CompletionRequest>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_response(&self, request: CompletionRequest) -> Result<MockResponse> {
        self.lock_requests().push(request);

        let response = {
            let mut responses = self.lock_responses();
            if responses.is_empty() {
                self.default_response
                    .clone()
                    .unwrap_or_else(|| MockResponse::text("Mock response (no responses configured)"))
            } else {
                responses.remove(0)
            }
        };

        if let Some(message) = &response.error {
            anyhow::bail!("{}", message);
        }
        Ok(response)
    }

    /// Backends without native tool calling never report tool calls.
    fn visible_tool_calls(&self, chunk: &MockChunk) -> Option<Vec<ToolCall>> {
        if self.native_tool_calling {
            chunk.tool_calls.clone()
        } else {
            None
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LLMProvider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let response = self.next_response(request)?;

        let content: String = response.chunks.iter().map(|c| c.content.as_str()).collect();
        let tool_calls: Vec<ToolCall> = response
            .chunks
            .iter()
            .filter_map(|c| self.visible_tool_calls(c))
            .flatten()
            .collect();
        let stop_reason = response.chunks.iter().rev().find_map(|c| c.stop_reason.clone());

        Ok(CompletionResponse {
            content,
            tool_calls,
            usage: response.usage,
            model: self.model.clone(),
            stop_reason,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let response = self.next_response(request)?;
        let usage = response.usage.clone();

        let chunks: Vec<CompletionChunk> = response
            .chunks
            .iter()
            .map(|chunk| CompletionChunk {
                content: chunk.content.clone(),
                finished: chunk.finished,
                tool_calls: self.visible_tool_calls(chunk),
                usage: if chunk.finished { Some(usage.clone()) } else { None },
                stop_reason: chunk.stop_reason.clone(),
            })
            .collect();

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(Ok(chunk)).await.is_err() {
                    // Receiver dropped, stop sending
                    break;
                }
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
        self.native_tool_calling
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }
}

// ============================================================================
// Preset Scenarios for Common Test Cases
// ============================================================================

pub mod scenarios {
    use super::*;

    pub fn text_only_response(text: &str) -> MockProvider {
        MockProvider::new().with_response(MockResponse::text(text))
    }

    /// Each call returns the next response in sequence
    pub fn multi_turn(responses: Vec<&str>) -> MockProvider {
        let mock_responses: Vec<MockResponse> =
            responses.into_iter().map(MockResponse::text).collect();
        MockProvider::new().with_responses(mock_responses)
    }

    /// One tool call, then a final text answer after the tool result arrives
    pub fn tool_then_response(
        tool: &str,
        args: serde_json::Value,
        final_response: &str,
    ) -> MockProvider {
        MockProvider::new()
            .with_native_tool_calling(true)
            .with_responses(vec![
                MockResponse::tool_call(tool, args),
                MockResponse::text(final_response),
            ])
    }

    /// A provider that asks for the same tool forever
    pub fn endless_tool_calls(tool: &str, args: serde_json::Value) -> MockProvider {
        MockProvider::new()
            .with_native_tool_calling(true)
            .with_default_response(MockResponse::tool_call(tool, args))
    }
}
