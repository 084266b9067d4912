//! CLI argument parsing for tandem.

use clap::Parser;
use std::path::PathBuf;
use tandem_config::Overrides;

#[derive(Parser, Clone, Debug)]
#[command(name = "tandem")]
#[command(about = "Edit a local project through interchangeable LLM backends")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Workspace directory (defaults to current directory)
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Request to run once instead of starting an interactive session
    pub task: Option<String>,

    /// Start in autonomous mode: architect plans, developer implements
    #[arg(long)]
    pub autonomous: bool,

    /// Override the default provider (e.g., 'openai' or 'groq')
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<String>,

    /// Override the model for the default provider
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Provider for the architect role
    #[arg(long, value_name = "PROVIDER")]
    pub architect: Option<String>,

    /// Provider for the developer role
    #[arg(long, value_name = "PROVIDER")]
    pub developer: Option<String>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            provider: self.provider.clone(),
            model: self.model.clone(),
            architect: self.architect.clone(),
            developer: self.developer.clone(),
        }
    }
}
