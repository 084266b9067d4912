//! Interactive mode for the tandem CLI.

use anyhow::Result;
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};
use std::path::Path;
use tracing::error;

use crate::commands::Mode;
use crate::session::{Flow, Session};
use crate::simple_output::SimpleOutput;

const HISTORY_FILE: &str = ".tandem_history";

/// Prompt string. Multiline continuation wins over everything else.
pub fn build_prompt(in_multiline: bool, mode: Mode, provider: &str) -> String {
    if in_multiline {
        return "... > ".to_string();
    }
    match mode {
        Mode::Interactive => format!("tandem [{}]> ", provider),
        Mode::Autonomous => "tandem [autonomous]> ".to_string(),
    }
}

fn print_welcome(session: &Session, project_dir: &Path, output: &SimpleOutput) {
    let agent = session.pool().active();
    output.print("");
    output.print("tandem editing agent");
    output.print("      >> type a request, 'help' for commands, 'exit' to leave");
    output.print("");
    println!(
        "🔧 {}{}{} | {}{}{}",
        SetForegroundColor(Color::Cyan),
        agent.name(),
        ResetColor,
        SetForegroundColor(Color::Yellow),
        agent.model(),
        ResetColor
    );
    output.print(&format!("📁 {}", project_dir.display()));
    output.print(&format!("mode: {}", session.mode()));
    output.print("");
}

/// Read lines until `exit` or end of input. A line ending in `\` continues
/// on the next line.
pub async fn run_interactive(mut session: Session, project_dir: &Path) -> Result<()> {
    let output = SimpleOutput::new();
    print_welcome(&session, project_dir, &output);

    let config = Config::builder().auto_add_history(false).build();
    let mut rl = DefaultEditor::with_config(config)?;

    let history_file = dirs::home_dir().map(|mut path| {
        path.push(HISTORY_FILE);
        path
    });
    if let Some(ref history_path) = history_file {
        let _ = rl.load_history(history_path);
    }

    let mut multiline_buffer = String::new();
    let mut in_multiline = false;

    loop {
        let prompt = build_prompt(in_multiline, session.mode(), session.pool().active().name());

        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                if in_multiline {
                    output.print("Multi-line input cancelled");
                    multiline_buffer.clear();
                    in_multiline = false;
                } else {
                    output.print("CTRL-C");
                }
                continue;
            }
            Err(ReadlineError::Eof) => {
                output.print("CTRL-D");
                break;
            }
            Err(err) => {
                error!("Error: {:?}", err);
                break;
            }
        };

        let trimmed = line.trim_end();
        if let Some(without_backslash) = trimmed.strip_suffix('\\') {
            multiline_buffer.push_str(without_backslash);
            multiline_buffer.push('\n');
            in_multiline = true;
            continue;
        }

        let input = if in_multiline {
            multiline_buffer.push_str(&line);
            in_multiline = false;
            std::mem::take(&mut multiline_buffer).trim().to_string()
        } else {
            line.trim().to_string()
        };
        if input.is_empty() {
            continue;
        }
        rl.add_history_entry(&input)?;

        // Ctrl-C abandons the turn; edits already made stay on disk
        let flow = tokio::select! {
            flow = session.handle_line(&input) => flow,
            _ = tokio::signal::ctrl_c() => {
                output.print("\n⚠️  Request cancelled (Ctrl+C)");
                Flow::Continue
            }
        };
        if flow == Flow::Exit {
            break;
        }
    }

    if let Some(ref history_path) = history_file {
        let _ = rl.save_history(history_path);
    }

    output.print("👋 Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt() {
        assert_eq!(build_prompt(false, Mode::Interactive, "openai"), "tandem [openai]> ");
        assert_eq!(build_prompt(false, Mode::Autonomous, "openai"), "tandem [autonomous]> ");
        assert_eq!(build_prompt(true, Mode::Autonomous, "openai"), "... > ");
    }
}
