pub mod adapter;
pub mod agent;
pub mod code_blocks;
pub mod conversation;
pub mod editor;
pub mod error;
pub mod error_handling;
pub mod intent;
pub mod pipeline;
pub mod project;
pub mod prompts;
pub mod provider_registration;
pub mod tool_definitions;
pub mod tool_dispatch;
pub mod tool_loop;
pub mod ui_writer;

pub use adapter::{GenerationSettings, ProviderAdapter};
pub use agent::{Agent, AgentPool, AgentSettings, TurnReport};
pub use code_blocks::{apply_code_blocks, extract_code_blocks, render_code_blocks, BlockWrite, CodeBlock};
pub use conversation::Conversation;
pub use editor::{CreateMode, EditResult, FileEditor};
pub use error::{AgentError, EditError, Role};
pub use intent::{Intent, IntentClassifier};
pub use pipeline::{split_plan, AutonomousPipeline, PipelineReport};
pub use project::{CompletionReport, ProjectAnalyzer};
pub use provider_registration::register_providers;
pub use tool_definitions::{create_tool_definitions, TEXT_EDITOR_TOOL};
pub use tool_dispatch::{ToolHandler, ToolRegistry, ToolResult};
pub use tool_loop::{LoopOutcome, LoopState, ToolCallLoop, DEFAULT_MAX_ROUNDS};
pub use ui_writer::{NullUiWriter, UiWriter};

// Provider types that appear in this crate's public API
pub use tandem_providers::{LLMProvider, Message, MessageRole, Tool, ToolCall};
