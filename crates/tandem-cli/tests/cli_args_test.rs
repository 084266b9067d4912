//! CLI argument parsing (blackbox over the public `Cli` type).

use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use tandem_cli::{Cli, Command, Mode};

#[test]
fn test_help_mentions_every_option() {
    let help = Cli::command().render_help().to_string();

    assert!(help.contains("Usage:"));
    for flag in ["--verbose", "--config", "--workspace", "--autonomous", "--provider", "--model", "--architect", "--developer"] {
        assert!(help.contains(flag), "help should mention {}", flag);
    }
}

#[test]
fn test_version_flag_is_handled_by_clap() {
    let err = Cli::try_parse_from(["tandem", "--version"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
}

#[test]
fn test_invalid_flag_is_rejected() {
    assert!(Cli::try_parse_from(["tandem", "--this-flag-does-not-exist"]).is_err());
}

#[test]
fn test_defaults() {
    let cli = Cli::try_parse_from(["tandem"]).unwrap();
    assert!(!cli.verbose);
    assert!(!cli.autonomous);
    assert!(cli.task.is_none());
    assert!(cli.workspace.is_none());

    let overrides = cli.overrides();
    assert!(overrides.provider.is_none());
    assert!(overrides.architect.is_none());
}

#[test]
fn test_single_shot_with_overrides() {
    let cli = Cli::try_parse_from([
        "tandem",
        "--workspace",
        "/tmp/site",
        "--provider",
        "anthropic",
        "--model",
        "claude-3-5-sonnet-20241022",
        "--architect",
        "gemini",
        "--developer",
        "groq",
        "--autonomous",
        "Add a contact page",
    ])
    .unwrap();

    assert_eq!(cli.task.as_deref(), Some("Add a contact page"));
    assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/site")));
    assert!(cli.autonomous);

    let overrides = cli.overrides();
    assert_eq!(overrides.provider.as_deref(), Some("anthropic"));
    assert_eq!(overrides.model.as_deref(), Some("claude-3-5-sonnet-20241022"));
    assert_eq!(overrides.architect.as_deref(), Some("gemini"));
    assert_eq!(overrides.developer.as_deref(), Some("groq"));
}

#[test]
fn test_session_commands_are_public() {
    assert_eq!(Command::parse("switch_mode interactive"), Command::SwitchMode(Mode::Interactive));
    assert_eq!(Mode::Autonomous.to_string(), "autonomous");
}
