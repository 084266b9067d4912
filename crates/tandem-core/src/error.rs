//! Error taxonomy for file edits and the agent loop.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of a single file mutation.
///
/// These never abort a conversation: the tool dispatcher renders them into
/// the tool result text so the model can see what went wrong and retry.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("File already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Directory is not empty: {}", .0.display())]
    NotEmpty(PathBuf),

    #[error("Expected exactly one occurrence of old_str in {}, found {count}", .path.display())]
    AmbiguousMatch { path: PathBuf, count: usize },

    #[error("Line {line} is out of range for {} ({line_count} lines)", .path.display())]
    OutOfRange {
        path: PathBuf,
        line: usize,
        line_count: usize,
    },

    #[error("No backup to restore for {}", .0.display())]
    NoBackup(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EditError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            EditError::NotFound(path)
        } else {
            EditError::Io { path, source }
        }
    }
}

/// Logical provider assignment in the autonomous pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Architect,
    Developer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Architect => write!(f, "architect"),
            Role::Developer => write!(f, "developer"),
        }
    }
}

/// Failures that end a turn. The interactive session reports them and keeps going.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Provider '{provider}' is unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    #[error("Malformed arguments for tool '{tool}': {message}")]
    MalformedToolArguments { tool: String, message: String },

    #[error("Tool-call loop did not converge after {rounds} rounds")]
    LoopNotConverging { rounds: usize },

    #[error("No {0} provider is available")]
    RoleUnavailable(Role),

    #[error(transparent)]
    Edit(#[from] EditError),
}
