//! Agents: one provider adapter, its own conversation and its own file editor.
//!
//! Each agent's [`FileEditor`] keeps its own backups. Two agents editing
//! the same path cannot undo each other's changes: `undo` on one agent only
//! restores what that agent changed.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tandem_providers::LLMProvider;
use tracing::{debug, info};

use crate::adapter::ProviderAdapter;
use crate::code_blocks::{apply_code_blocks, extract_code_blocks, BlockWrite};
use crate::conversation::Conversation;
use crate::editor::FileEditor;
use crate::error::{AgentError, EditError};
use crate::tool_dispatch::ToolRegistry;
use crate::tool_loop::{LoopOutcome, ToolCallLoop};
use crate::ui_writer::UiWriter;

/// Settings shared by every agent in a pool.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub project_dir: PathBuf,
    pub system_prompt: String,
    pub max_rounds: usize,
    pub streaming: bool,
    pub max_retry_attempts: u32,
}

/// What one interactive turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub text: String,
    pub rounds: usize,
    pub tool_calls: usize,
    /// Files written from code blocks in the final text
    pub files_written: Vec<String>,
}

pub struct Agent {
    adapter: ProviderAdapter,
    conversation: Conversation,
    tool_loop: ToolCallLoop,
}

impl Agent {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: &AgentSettings) -> Self {
        let tools = ToolRegistry::new(FileEditor::new(&settings.project_dir));
        let adapter = ProviderAdapter::new(provider, tools).with_max_retry_attempts(settings.max_retry_attempts);

        Self {
            adapter,
            conversation: Conversation::new(settings.system_prompt.clone()),
            tool_loop: ToolCallLoop::new(settings.max_rounds).with_streaming(settings.streaming),
        }
    }

    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    pub fn model(&self) -> &str {
        self.adapter.model()
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.adapter.set_model(model);
    }

    pub fn supports_tools(&self) -> bool {
        self.adapter.supports_tools()
    }

    /// Whether replies reach the UI as they are generated.
    pub fn streams(&self) -> bool {
        self.tool_loop.is_streaming()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn project_dir(&self) -> &Path {
        self.adapter.tools().editor().root()
    }

    pub fn editor(&self) -> &FileEditor {
        self.adapter.tools().editor()
    }

    pub fn editor_mut(&mut self) -> &mut FileEditor {
        self.adapter.tools_mut().editor_mut()
    }

    /// Restore the backup this agent holds for `path`.
    pub fn undo(&mut self, path: &str) -> Result<(), EditError> {
        self.editor_mut().undo(path)
    }

    /// Run a tool-enabled turn in the agent's own conversation, then write
    /// any code blocks found in the final reply.
    pub async fn respond(&mut self, input: &str, ui: &dyn UiWriter) -> Result<TurnReport, AgentError> {
        let outcome = self
            .tool_loop
            .run(&mut self.adapter, &mut self.conversation, input, true, ui)
            .await?;

        let files_written = self
            .apply_code_blocks(&outcome.text, ui)
            .into_iter()
            .filter(|w| w.result.is_ok())
            .map(|w| w.path)
            .collect();

        Ok(TurnReport {
            text: outcome.text,
            rounds: outcome.rounds,
            tool_calls: outcome.tool_calls,
            files_written,
        })
    }

    /// Run a turn in a conversation owned by the caller.
    pub async fn run_in(
        &mut self,
        conversation: &mut Conversation,
        input: &str,
        tools_enabled: bool,
        ui: &dyn UiWriter,
    ) -> Result<LoopOutcome, AgentError> {
        self.tool_loop
            .run(&mut self.adapter, conversation, input, tools_enabled, ui)
            .await
    }

    /// Extract code blocks from `text` and write them, overwriting existing files.
    pub fn apply_code_blocks(&mut self, text: &str, ui: &dyn UiWriter) -> Vec<BlockWrite> {
        let blocks = extract_code_blocks(text);
        if blocks.is_empty() {
            return Vec::new();
        }

        debug!("{} code blocks found in reply from {}", blocks.len(), self.name());
        let writes = apply_code_blocks(self.editor_mut(), &blocks);
        for write in &writes {
            let error = write.result.as_ref().err().map(|e| e.to_string());
            ui.print_file_write(&write.path, error.as_deref());
        }
        writes
    }
}

/// Agents for every registered provider, in registration order, with one active.
pub struct AgentPool {
    agents: Vec<Agent>,
    active: usize,
}

impl AgentPool {
    /// Fails if `providers` is empty.
    pub fn from_providers(
        providers: Vec<Arc<dyn LLMProvider>>,
        settings: &AgentSettings,
        default_provider: Option<&str>,
    ) -> Result<Self> {
        if providers.is_empty() {
            anyhow::bail!("No providers available");
        }

        let agents: Vec<Agent> = providers
            .into_iter()
            .map(|provider| Agent::new(provider, settings))
            .collect();
        let active = default_provider
            .and_then(|name| agents.iter().position(|a| a.name() == name))
            .unwrap_or(0);
        info!("Active provider: {}", agents[active].name());

        Ok(Self { agents, active })
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.iter().any(|a| a.name() == name)
    }

    pub fn active(&self) -> &Agent {
        &self.agents[self.active]
    }

    pub fn active_mut(&mut self) -> &mut Agent {
        &mut self.agents[self.active]
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        match self.agents.iter().position(|a| a.name() == name) {
            Some(index) => {
                self.active = index;
                info!("Switched active provider to {}", name);
                Ok(())
            }
            None => anyhow::bail!(
                "Provider '{}' is not available. Available: {}",
                name,
                self.names().join(", ")
            ),
        }
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui_writer::NullUiWriter;
    use tandem_providers::{MockProvider, MockResponse};
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> AgentSettings {
        AgentSettings {
            project_dir: dir.path().to_path_buf(),
            system_prompt: "test".to_string(),
            max_rounds: 5,
            streaming: false,
            max_retry_attempts: 1,
        }
    }

    #[tokio::test]
    async fn test_respond_writes_code_blocks_from_final_text() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::new().with_response(MockResponse::text(
            "Here you go:\n```file:src/app.py\nprint('hi')\n```\n",
        ));
        let mut agent = Agent::new(Arc::new(provider), &settings(&dir));

        let report = agent.respond("write app", &NullUiWriter).await.unwrap();
        assert_eq!(report.files_written, vec!["src/app.py".to_string()]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/app.py")).unwrap(),
            "print('hi')"
        );
    }

    #[test]
    fn test_pool_selects_default_and_switches() {
        let dir = TempDir::new().unwrap();
        let providers: Vec<Arc<dyn LLMProvider>> = vec![
            Arc::new(MockProvider::new().with_name("openai")),
            Arc::new(MockProvider::new().with_name("gemini")),
        ];

        let mut pool = AgentPool::from_providers(providers, &settings(&dir), Some("gemini")).unwrap();
        assert_eq!(pool.active().name(), "gemini");
        assert_eq!(pool.names(), vec!["openai", "gemini"]);

        pool.set_active("openai").unwrap();
        assert_eq!(pool.active().name(), "openai");
        assert!(pool.set_active("anthropic").is_err());
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(AgentPool::from_providers(Vec::new(), &settings(&dir), None).is_err());
    }

    #[test]
    fn test_agents_keep_separate_backups() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("shared.txt"), "base").unwrap();
        let providers: Vec<Arc<dyn LLMProvider>> = vec![
            Arc::new(MockProvider::new().with_name("a")),
            Arc::new(MockProvider::new().with_name("b")),
        ];
        let mut pool = AgentPool::from_providers(providers, &settings(&dir), None).unwrap();

        pool.get_mut("a")
            .unwrap()
            .apply_code_blocks("```file:shared.txt\nfrom a\n```", &NullUiWriter);

        assert!(matches!(
            pool.get_mut("b").unwrap().undo("shared.txt"),
            Err(EditError::NoBackup(_))
        ));
        pool.get_mut("a").unwrap().undo("shared.txt").unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("shared.txt")).unwrap(), "base");
    }
}
