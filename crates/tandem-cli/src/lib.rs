//! tandem CLI - command-line interface for the tandem editing agent.

mod cli_args;
mod commands;
mod interactive;
mod session;
mod simple_output;
mod ui_writer_impl;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};

use tandem_config::{load_dotenv, Config, Credentials};
use tandem_core::prompts::developer_system_prompt;
use tandem_core::{register_providers, AgentPool, AgentSettings, AutonomousPipeline};

pub use cli_args::Cli;
pub use commands::{Command, Mode};

use interactive::run_interactive;
use session::Session;
use simple_output::SimpleOutput;
use ui_writer_impl::ConsoleUiWriter;

const LOG_TARGETS: [&str; 5] = ["tandem", "tandem_cli", "tandem_core", "tandem_providers", "tandem_config"];

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(&cli);
    load_dotenv();

    let output = SimpleOutput::new();
    let config = Config::load_with_overrides(cli.config.as_deref(), &cli.overrides())?;

    let workspace_dir = determine_workspace_dir(&cli)?;
    let project_dir = config.project_dir(&workspace_dir);
    std::fs::create_dir_all(&project_dir)
        .with_context(|| format!("Failed to create project directory {}", project_dir.display()))?;
    debug!("Project directory: {}", project_dir.display());

    let registry = register_providers(&config, &Credentials::from_env(&config));
    if registry.is_empty() {
        output.print_error(
            "No providers available. Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY or \
             OPENROUTER_API_KEY, or add an api_key to the configuration.",
        );
        return Ok(());
    }

    let roles = config.resolve_roles(&registry.list_providers());
    info!("Roles: architect={:?} developer={:?}", roles.architect, roles.developer);
    let default_provider = registry.default_provider().map(str::to_string);

    let prompt_file = config
        .agent
        .system_prompt_file
        .as_ref()
        .map(|file| workspace_dir.join(file));
    let developer_prompt = developer_system_prompt(prompt_file.as_deref());

    let settings = AgentSettings {
        project_dir: project_dir.clone(),
        system_prompt: developer_prompt.clone(),
        max_rounds: config.agent.max_tool_rounds,
        streaming: config.agent.enable_streaming,
        max_retry_attempts: config.agent.max_retry_attempts,
    };
    let pool = AgentPool::from_providers(registry.into_providers(), &settings, default_provider.as_deref())?;
    let pipeline = AutonomousPipeline::new(roles, developer_prompt);

    let mode = if cli.autonomous { Mode::Autonomous } else { Mode::Interactive };
    let mut session = Session::new(
        pool,
        pipeline,
        mode,
        config.agent.enable_streaming,
        Box::new(ConsoleUiWriter::new()),
    );

    match cli.task {
        Some(task) => {
            session.handle_line(&task).await;
            Ok(())
        }
        None => run_interactive(session, &project_dir).await,
    }
}

// --- Helper functions ---

fn initialize_logging(cli: &Cli) {
    use tracing_subscriber::filter::Directive;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = LOG_TARGETS
        .iter()
        .filter_map(|target| format!("{}={}", target, level).parse::<Directive>().ok())
        .fold(EnvFilter::from_default_env(), |filter, directive| filter.add_directive(directive));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

fn determine_workspace_dir(cli: &Cli) -> Result<PathBuf> {
    match &cli.workspace {
        Some(ws) => Ok(ws.clone()),
        None => Ok(std::env::current_dir()?),
    }
}
