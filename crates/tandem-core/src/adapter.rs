//! Provider adapter: the capability set the tool-call loop consumes.
//!
//! Wraps one [`LLMProvider`] together with the tools it may call. Backends
//! without native tool calling get no tool schema, never report tool calls,
//! and `dispatch_tool_calls` is a no-op for them, so the loop degenerates to
//! a single round trip without branching on provider identity.

use std::sync::Arc;
use tandem_providers::{CompletionRequest, LLMProvider, Message, Tool, ToolCall};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::conversation::Conversation;
use crate::error::AgentError;
use crate::error_handling::retry_with_backoff;
use crate::tool_dispatch::ToolRegistry;
use crate::ui_writer::UiWriter;

/// Generation parameters that may be changed between turns.
#[derive(Debug, Clone, Default)]
pub struct GenerationSettings {
    /// Overrides the model the provider was constructed with
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

pub struct ProviderAdapter {
    provider: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    settings: GenerationSettings,
    max_retry_attempts: u32,
}

impl ProviderAdapter {
    pub fn new(provider: Arc<dyn LLMProvider>, tools: ToolRegistry) -> Self {
        Self {
            provider,
            tools,
            settings: GenerationSettings::default(),
            max_retry_attempts: 3,
        }
    }

    pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = attempts.max(1);
        self
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    /// Model in effect for the next request.
    pub fn model(&self) -> &str {
        self.settings
            .model
            .as_deref()
            .unwrap_or_else(|| self.provider.model())
    }

    pub fn supports_tools(&self) -> bool {
        self.provider.has_native_tool_calling()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        debug!("Switching {} to model {}", self.name(), model);
        self.settings.model = Some(model);
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.settings.temperature = Some(temperature);
    }

    /// Tool schema to send, if any. Providers without tool calling never get one.
    pub fn declare_tools(&self, enabled: bool) -> Option<Vec<Tool>> {
        if enabled && self.supports_tools() {
            Some(self.tools.definitions())
        } else {
            None
        }
    }

    fn build_request(&self, conversation: &Conversation, tools_enabled: bool, stream: bool) -> CompletionRequest {
        let mut request = CompletionRequest::new(conversation.request_messages());
        request.model = self.settings.model.clone();
        request.temperature = self.settings.temperature;
        request.max_tokens = self.settings.max_tokens;
        request.stream = stream;
        request.tools = self.declare_tools(tools_enabled);
        request
    }

    fn unavailable(&self, error: anyhow::Error) -> AgentError {
        AgentError::ProviderUnavailable {
            provider: self.name().to_string(),
            message: format!("{:#}", error),
        }
    }

    /// Append the assistant turn, dropping tool calls nobody asked for.
    fn record_reply(
        &self,
        conversation: &mut Conversation,
        content: String,
        mut tool_calls: Vec<ToolCall>,
        tools_declared: bool,
    ) -> String {
        if !tools_declared && !tool_calls.is_empty() {
            warn!(
                "{} returned {} tool calls without a tool schema; ignoring them",
                self.name(),
                tool_calls.len()
            );
            tool_calls.clear();
        }
        conversation.push(Message::assistant(content.clone(), tool_calls));
        content
    }

    /// One non-streaming round trip. The assistant message is appended to
    /// `conversation` and its text returned.
    pub async fn complete(
        &self,
        conversation: &mut Conversation,
        tools_enabled: bool,
    ) -> Result<String, AgentError> {
        let request = self.build_request(conversation, tools_enabled, false);
        let tools_declared = request.tools.is_some();
        debug!(
            "{} completion: {} messages, tools declared: {}",
            self.name(),
            request.messages.len(),
            tools_declared
        );

        let provider = self.provider.clone();
        let response = retry_with_backoff(
            &format!("{} completion", self.name()),
            || {
                let provider = provider.clone();
                let request = request.clone();
                async move { provider.complete(request).await }
            },
            self.max_retry_attempts,
        )
        .await
        .map_err(|e| self.unavailable(e))?;

        debug!(
            "{} replied with {} chars, {} tool calls, usage {:?}",
            self.name(),
            response.content.len(),
            response.tool_calls.len(),
            response.usage
        );
        Ok(self.record_reply(conversation, response.content, response.tool_calls, tools_declared))
    }

    /// Streaming round trip. Each text chunk goes to `on_chunk` in generation
    /// order; when the stream ends a single consolidated assistant message is
    /// appended. A stream that fails midway appends nothing.
    pub async fn stream(
        &self,
        conversation: &mut Conversation,
        tools_enabled: bool,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, AgentError> {
        let request = self.build_request(conversation, tools_enabled, true);
        let tools_declared = request.tools.is_some();

        let provider = self.provider.clone();
        let mut stream = retry_with_backoff(
            &format!("{} stream", self.name()),
            || {
                let provider = provider.clone();
                let request = request.clone();
                async move { provider.stream(request).await }
            },
            self.max_retry_attempts,
        )
        .await
        .map_err(|e| self.unavailable(e))?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.unavailable(e))?;
            if !chunk.content.is_empty() {
                on_chunk(&chunk.content);
                content.push_str(&chunk.content);
            }
            if let Some(calls) = chunk.tool_calls {
                tool_calls.extend(calls);
            }
            if chunk.finished {
                break;
            }
        }

        Ok(self.record_reply(conversation, content, tool_calls, tools_declared))
    }

    /// Execute `calls` in order and append one tool message per call.
    /// Returns whether anything ran; backends without tool calling always
    /// return `false`.
    pub fn dispatch_tool_calls(
        &mut self,
        conversation: &mut Conversation,
        calls: &[ToolCall],
        ui: &dyn UiWriter,
    ) -> bool {
        if !self.supports_tools() || calls.is_empty() {
            return false;
        }

        for call in calls {
            let args = serde_json::from_str::<serde_json::Value>(&call.arguments).ok();
            ui.print_tool_header(&call.name, args.as_ref());

            let result = self.tools.dispatch(call);
            ui.print_tool_result(&result.text, result.is_error);
            conversation.push(Message::tool_result(result.tool_call_id, result.text));
        }

        true
    }
}
