//! The tool-call loop.
//!
//! ```text
//! Idle -> AwaitingCompletion -> (tool calls?) DispatchingTools -> AwaitingCompletion
//!                            -> (none)        Idle
//! ```
//!
//! After tools run, the provider is called again with no new user input;
//! the appended tool results are the new input. The loop ends when a reply
//! carries no tool calls, or fails with `LoopNotConverging` once the round
//! ceiling is reached.

use tandem_providers::Message;
use tracing::{debug, info, warn};

use crate::adapter::ProviderAdapter;
use crate::conversation::Conversation;
use crate::error::AgentError;
use crate::ui_writer::UiWriter;

pub const DEFAULT_MAX_ROUNDS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    AwaitingCompletion,
    DispatchingTools,
}

/// Result of one completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Text of the final reply, the one without tool calls
    pub text: String,
    /// Provider round trips made
    pub rounds: usize,
    /// Tool calls executed across all rounds
    pub tool_calls: usize,
}

#[derive(Debug, Clone)]
pub struct ToolCallLoop {
    max_rounds: usize,
    streaming: bool,
    state: LoopState,
}

impl Default for ToolCallLoop {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ROUNDS)
    }
}

impl ToolCallLoop {
    pub fn new(max_rounds: usize) -> Self {
        Self {
            max_rounds: max_rounds.max(1),
            streaming: false,
            state: LoopState::Idle,
        }
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Append `input` as a user message and drive the conversation until
    /// the provider answers without tool calls.
    ///
    /// With `tools_enabled` false no tool schema is declared, so the run is
    /// a single round trip.
    pub async fn run(
        &mut self,
        adapter: &mut ProviderAdapter,
        conversation: &mut Conversation,
        input: &str,
        tools_enabled: bool,
        ui: &dyn UiWriter,
    ) -> Result<LoopOutcome, AgentError> {
        conversation.push(Message::user(input));

        let result = self.drive(adapter, conversation, tools_enabled, ui).await;
        self.state = LoopState::Idle;
        result
    }

    async fn drive(
        &mut self,
        adapter: &mut ProviderAdapter,
        conversation: &mut Conversation,
        tools_enabled: bool,
        ui: &dyn UiWriter,
    ) -> Result<LoopOutcome, AgentError> {
        let mut rounds = 0;
        let mut tool_calls = 0;

        loop {
            if rounds >= self.max_rounds {
                warn!(
                    "{} still requesting tools after {} rounds",
                    adapter.name(),
                    rounds
                );
                return Err(AgentError::LoopNotConverging { rounds });
            }

            self.state = LoopState::AwaitingCompletion;
            rounds += 1;
            let text = if self.streaming {
                let mut print_chunk = |chunk: &str| ui.print_inline(chunk);
                let text = adapter.stream(conversation, tools_enabled, &mut print_chunk).await?;
                ui.println("");
                text
            } else {
                adapter.complete(conversation, tools_enabled).await?
            };

            let pending = conversation.pending_tool_calls();
            if pending.is_empty() {
                info!("{} finished after {} rounds", adapter.name(), rounds);
                return Ok(LoopOutcome {
                    text,
                    rounds,
                    tool_calls,
                });
            }

            self.state = LoopState::DispatchingTools;
            debug!("Round {}: dispatching {} tool calls", rounds, pending.len());
            if !adapter.dispatch_tool_calls(conversation, &pending, ui) {
                return Ok(LoopOutcome {
                    text,
                    rounds,
                    tool_calls,
                });
            }
            tool_calls += pending.len();
        }
    }
}
