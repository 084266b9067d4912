//! Autonomous mode: an architect analyzes the project and writes a plan, a
//! developer carries it out.
//!
//! The sequence is fixed: analysis, plan, then one developer turn per plan
//! segment, with every code block in the developer's final reply written to
//! disk. Without an architect the active agent answers the request directly.

use tandem_config::RoleAssignment;
use tracing::{info, warn};

use crate::agent::AgentPool;
use crate::conversation::Conversation;
use crate::error::{AgentError, Role};
use crate::prompts::{analysis_prompt, plan_prompt, ARCHITECT_SYSTEM_PROMPT};
use crate::ui_writer::UiWriter;

/// What an autonomous run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Which agent handled the request without a plan, if no architect was available
    pub direct_provider: Option<String>,
    pub analysis: Option<String>,
    pub plan: Option<String>,
    /// Final developer text, one per plan segment
    pub responses: Vec<String>,
    pub files_written: Vec<String>,
    /// Paths whose write failed, with the error
    pub failed_writes: Vec<(String, String)>,
}

pub struct AutonomousPipeline {
    roles: RoleAssignment,
    developer_prompt: String,
}

impl AutonomousPipeline {
    pub fn new(roles: RoleAssignment, developer_prompt: impl Into<String>) -> Self {
        Self {
            roles,
            developer_prompt: developer_prompt.into(),
        }
    }

    pub fn roles(&self) -> &RoleAssignment {
        &self.roles
    }

    pub async fn run(
        &self,
        pool: &mut AgentPool,
        input: &str,
        ui: &dyn UiWriter,
    ) -> Result<PipelineReport, AgentError> {
        let architect_name = self.roles.architect.as_deref().filter(|name| pool.contains(name));
        let Some(architect_name) = architect_name else {
            warn!("No architect provider available; sending the request to the active provider");
            ui.println("No architect provider available, running the request directly.");
            return self.run_direct(pool, input, ui).await;
        };

        let mut report = PipelineReport::default();
        let mut architect_conversation = Conversation::new(ARCHITECT_SYSTEM_PROMPT);

        let architect = pool
            .get_mut(architect_name)
            .ok_or(AgentError::RoleUnavailable(Role::Architect))?;

        ui.print_stage(&format!("Analysis ({})", architect_name));
        let analysis = architect
            .run_in(&mut architect_conversation, &analysis_prompt(input), false, ui)
            .await?
            .text;
        if !architect.streams() {
            ui.println(&analysis);
        }

        ui.print_stage(&format!("Plan ({})", architect_name));
        let plan = architect
            .run_in(&mut architect_conversation, &plan_prompt(&analysis), false, ui)
            .await?
            .text;
        if !architect.streams() {
            ui.println(&plan);
        }

        report.analysis = Some(analysis);
        report.plan = Some(plan.clone());

        let developer_name = self.roles.developer.as_deref().filter(|name| pool.contains(name));
        let Some(developer) = developer_name.and_then(|name| pool.get_mut(name)) else {
            warn!("No developer provider available; plan will not be executed");
            return Err(AgentError::RoleUnavailable(Role::Developer));
        };

        let segments = split_plan(&plan);
        info!("Handing {} plan segments to {}", segments.len(), developer.name());
        ui.print_stage(&format!("Development ({})", developer.name()));

        let mut developer_conversation = Conversation::new(self.developer_prompt.clone());
        for segment in segments {
            let outcome = developer
                .run_in(&mut developer_conversation, &segment, true, ui)
                .await?;
            if !developer.streams() {
                ui.println(&outcome.text);
            }

            for write in developer.apply_code_blocks(&outcome.text, ui) {
                match write.result {
                    Ok(()) => report.files_written.push(write.path),
                    Err(e) => report.failed_writes.push((write.path, e.to_string())),
                }
            }
            report.responses.push(outcome.text);
        }

        Ok(report)
    }

    async fn run_direct(
        &self,
        pool: &mut AgentPool,
        input: &str,
        ui: &dyn UiWriter,
    ) -> Result<PipelineReport, AgentError> {
        let agent = pool.active_mut();
        let name = agent.name().to_string();
        let turn = agent.respond(input, ui).await?;

        Ok(PipelineReport {
            direct_provider: Some(name),
            responses: vec![turn.text],
            files_written: turn.files_written,
            ..Default::default()
        })
    }
}

/// Split a plan into top-level segments at `---` rules outside code fences.
/// Empty segments are dropped.
pub fn split_plan(plan: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in plan.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence || trimmed.starts_with("```file:");
        }

        if !in_fence && trimmed == "---" {
            segments.push(current.join("\n"));
            current.clear();
        } else {
            current.push(line);
        }
    }
    segments.push(current.join("\n"));

    segments
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
