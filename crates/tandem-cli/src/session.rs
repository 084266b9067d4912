//! One tandem session: the agent pool, the current mode and the handling of
//! each input line. Used by both the interactive loop and single-shot runs.

use tandem_core::{
    AgentPool, AutonomousPipeline, FileEditor, Intent, IntentClassifier, PipelineReport, ProjectAnalyzer,
    UiWriter,
};
use tracing::{debug, error, warn};

use crate::commands::{Command, Mode, HELP_TEXT};
use crate::simple_output::SimpleOutput;

/// Whether the session keeps reading input after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Session {
    pool: AgentPool,
    pipeline: AutonomousPipeline,
    mode: Mode,
    streaming: bool,
    classifier: Option<IntentClassifier>,
    ui: Box<dyn UiWriter>,
    output: SimpleOutput,
}

impl Session {
    pub fn new(
        pool: AgentPool,
        pipeline: AutonomousPipeline,
        mode: Mode,
        streaming: bool,
        ui: Box<dyn UiWriter>,
    ) -> Self {
        let classifier = match IntentClassifier::new() {
            Ok(classifier) => Some(classifier),
            Err(e) => {
                warn!("Intent classifier disabled: {}", e);
                None
            }
        };

        Self {
            pool,
            pipeline,
            mode,
            streaming,
            classifier,
            ui,
            output: SimpleOutput::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pool(&self) -> &AgentPool {
        &self.pool
    }

    /// Handle one input line. Turn failures are reported here and never
    /// end the session.
    pub async fn handle_line(&mut self, line: &str) -> Flow {
        match Command::parse(line) {
            Command::Exit => return Flow::Exit,
            Command::Help => self.output.print(HELP_TEXT),
            Command::History => self.print_history(),
            Command::Providers => self.print_providers(),
            Command::Switch(name) => match self.pool.set_active(&name) {
                Ok(()) => self.output.print_status(&format!("switched to {}", name)),
                Err(e) => self.output.print_error(&e.to_string()),
            },
            Command::SwitchModel(model) => {
                let agent = self.pool.active_mut();
                agent.set_model(model.as_str());
                self.output
                    .print_status(&format!("{} now uses {}", agent.name(), agent.model()));
            }
            Command::SwitchMode(mode) => {
                self.mode = mode;
                self.output.print_status(&format!("mode: {}", mode));
            }
            Command::Undo(path) => match self.pool.active_mut().undo(&path) {
                Ok(()) => self.output.print_status(&format!("restored {}", path)),
                Err(e) => self.output.print_error(&e.to_string()),
            },
            Command::Invalid(usage) => self.output.print_error(&usage),
            Command::Request(input) => self.handle_request(&input).await,
        }
        Flow::Continue
    }

    async fn handle_request(&mut self, input: &str) {
        match self.mode {
            Mode::Interactive => {
                if let Some(answer) = self.answer_locally(input) {
                    self.output.print(&answer);
                    return;
                }
                self.run_turn(input).await;
            }
            Mode::Autonomous => self.run_pipeline(input).await,
        }
    }

    async fn run_turn(&mut self, input: &str) {
        let agent = self.pool.active_mut();
        debug!("Sending request to {}", agent.name());

        match agent.respond(input, self.ui.as_ref()).await {
            Ok(turn) => {
                if !self.streaming {
                    self.output.print(&turn.text);
                }
                debug!(
                    "Turn finished: {} rounds, {} tool calls, {} files written",
                    turn.rounds,
                    turn.tool_calls,
                    turn.files_written.len()
                );
            }
            Err(e) => {
                error!("Turn failed: {}", e);
                self.output.print_error(&e.to_string());
            }
        }
    }

    async fn run_pipeline(&mut self, input: &str) {
        match self.pipeline.run(&mut self.pool, input, self.ui.as_ref()).await {
            Ok(report) => {
                if report.direct_provider.is_some() && !self.streaming {
                    for response in &report.responses {
                        self.output.print(response);
                    }
                }
                self.output.print_status(&pipeline_summary(&report));
            }
            Err(e) => {
                error!("Autonomous run failed: {}", e);
                self.output.print_error(&e.to_string());
            }
        }
    }

    /// Answer project questions without a provider call. `None` means the
    /// request is for the agent.
    fn answer_locally(&self, input: &str) -> Option<String> {
        let intent = self.classifier.as_ref()?.classify(input);
        if intent.is_unknown() {
            return None;
        }
        debug!("Answering '{}' locally", intent.action());

        let agent = self.pool.active();
        let analyzer = ProjectAnalyzer::new(agent.project_dir());
        Some(answer_intent(&intent, &analyzer, agent.editor()))
    }

    fn print_history(&self) {
        let agent = self.pool.active();
        let history = agent.conversation().history();
        if history.is_empty() {
            self.output.print(&format!("No conversation with {} yet.", agent.name()));
            return;
        }
        for entry in history {
            self.output.print(&entry);
        }
    }

    fn print_providers(&self) {
        let active = self.pool.active().name();
        let roles = self.pipeline.roles();
        for name in self.pool.names() {
            let mut tags = Vec::new();
            if name == active {
                tags.push("active");
            }
            if roles.architect.as_deref() == Some(name) {
                tags.push("architect");
            }
            if roles.developer.as_deref() == Some(name) {
                tags.push("developer");
            }

            let marker = if name == active { "*" } else { " " };
            if tags.is_empty() {
                self.output.print(&format!("{} {}", marker, name));
            } else {
                self.output.print(&format!("{} {} ({})", marker, name, tags.join(", ")));
            }
        }
    }
}

/// Text answer for a recognized intent.
fn answer_intent(intent: &Intent, analyzer: &ProjectAnalyzer, editor: &FileEditor) -> String {
    match intent {
        Intent::AnalyzeProject => {
            let report = analyzer.calculate_completion();
            format!(
                "Architecture: {}\nCompletion: {}%\nMissing components: {}\nFiles: {}",
                analyzer.detect_architecture(),
                report.completion,
                list_or_none(&report.missing_components),
                report.file_count
            )
        }
        Intent::CalculateCompletion => {
            let report = analyzer.calculate_completion();
            format!(
                "Completion: {}% ({})\nMissing components: {}",
                report.completion,
                report.architecture,
                list_or_none(&report.missing_components)
            )
        }
        Intent::DetectArchitecture => format!("Detected architecture: {}", analyzer.detect_architecture()),
        Intent::ListFiles { path } => match editor.list_files(path, false) {
            Ok(entries) if entries.is_empty() => format!("'{}' is empty.", path),
            Ok(entries) => entries.join("\n"),
            Err(e) => format!("Error: {}", e),
        },
        Intent::View { path } => editor.view(path).unwrap_or_else(|e| format!("Error: {}", e)),
        Intent::Unknown { message } => message.clone(),
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

fn pipeline_summary(report: &PipelineReport) -> String {
    let mut summary = match &report.direct_provider {
        Some(provider) => format!("answered directly by {}", provider),
        None => format!("{} plan segments carried out", report.responses.len()),
    };

    if !report.files_written.is_empty() {
        summary.push_str(&format!("; wrote {}", report.files_written.join(", ")));
    }
    if !report.failed_writes.is_empty() {
        let failed: Vec<String> = report
            .failed_writes
            .iter()
            .map(|(path, e)| format!("{} ({})", path, e))
            .collect();
        summary.push_str(&format!("; failed {}", failed.join(", ")));
    }
    summary
}
