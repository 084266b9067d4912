//! Session command parsing.
//!
//! A line whose first word is a known command is handled by the session;
//! anything else is a request for the agent.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Requests go to the active provider
    Interactive,
    /// Requests go through the architect/developer pipeline
    Autonomous,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Interactive => write!(f, "interactive"),
            Mode::Autonomous => write!(f, "autonomous"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "interactive" => Ok(Mode::Interactive),
            "autonomous" => Ok(Mode::Autonomous),
            other => Err(format!("Unknown mode '{}'. Use 'interactive' or 'autonomous'.", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Help,
    History,
    Providers,
    Switch(String),
    SwitchModel(String),
    SwitchMode(Mode),
    Undo(String),
    /// A command with a missing or bad argument; carries the usage text
    Invalid(String),
    /// Not a command: send to the agent
    Request(String),
}

pub const HELP_TEXT: &str = "\
Commands:
  exit | quit                  Leave the session
  history                      Show this provider's conversation
  providers                    List providers and roles
  switch <provider>            Make another provider active
  switch_model <model>         Change the active provider's model
  switch_mode <mode>           interactive or autonomous
  undo <path>                  Restore a file from the active provider's backup
  help                         Show this text
Anything else is sent as a request.";

impl Command {
    pub fn parse(input: &str) -> Command {
        let input = input.trim();
        let (word, rest) = match input.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (input, ""),
        };

        let with_arg = |usage: &str, build: fn(String) -> Command| {
            if rest.is_empty() {
                Command::Invalid(format!("Usage: {}", usage))
            } else {
                build(rest.to_string())
            }
        };

        match word {
            "exit" | "quit" if rest.is_empty() => Command::Exit,
            "help" if rest.is_empty() => Command::Help,
            "history" if rest.is_empty() => Command::History,
            "providers" if rest.is_empty() => Command::Providers,
            "switch" => with_arg("switch <provider>", Command::Switch),
            "switch_model" => with_arg("switch_model <model>", Command::SwitchModel),
            "switch_mode" => match rest.parse::<Mode>() {
                Ok(mode) => Command::SwitchMode(mode),
                Err(_) if rest.is_empty() => {
                    Command::Invalid("Usage: switch_mode <interactive|autonomous>".to_string())
                }
                Err(e) => Command::Invalid(e),
            },
            "undo" => with_arg("undo <path>", Command::Undo),
            _ => Command::Request(input.to_string()),
        }
    }
}
