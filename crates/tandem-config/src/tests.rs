use crate::{default_config_paths, Config, Credentials, Overrides, RoleAssignment};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> String {
    let path = dir.path().join("tandem.toml");
    fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_partial_file_keeps_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        &temp_dir,
        r#"
[providers]
default_provider = "anthropic"

[providers.anthropic]
model = "claude-3-5-haiku-latest"
"#,
    );

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.providers.default_provider, "anthropic");
    assert_eq!(
        config.providers.anthropic.model.as_deref(),
        Some("claude-3-5-haiku-latest")
    );
    assert_eq!(config.agent.max_tool_rounds, 25);
    assert_eq!(config.agent.project_dir, "project");
    assert!(!config.agent.enable_streaming);
}

#[test]
fn test_missing_explicit_path_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");
    assert!(Config::load(Some(missing.to_str().unwrap())).is_err());
}

#[test]
fn test_unknown_default_provider_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        &temp_dir,
        r#"
[providers]
default_provider = "deepthought"
"#,
    );

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("deepthought"));
}

#[test]
fn test_openai_compatible_names_are_valid_providers() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        &temp_dir,
        r#"
[providers]
default_provider = "groq"
developer = "groq"

[providers.openai_compatible.groq]
base_url = "https://api.groq.com/openai/v1"
model = "llama-3.1-70b-versatile"
api_key_env = "GROQ_API_KEY"
"#,
    );

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.providers.default_provider, "groq");
    assert_eq!(
        config.providers.openai_compatible["groq"].api_key_env.as_deref(),
        Some("GROQ_API_KEY")
    );
}

#[test]
fn test_zero_round_ceiling_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        &temp_dir,
        r#"
[agent]
max_tool_rounds = 0
"#,
    );

    assert!(Config::load(Some(&path)).is_err());
}

#[test]
fn test_overrides_apply_model_to_active_provider() {
    let mut config = Config::default();
    config
        .apply_overrides(&Overrides {
            provider: Some("gemini".to_string()),
            model: Some("gemini-1.5-flash".to_string()),
            architect: None,
            developer: Some("anthropic".to_string()),
        })
        .unwrap();

    assert_eq!(config.providers.default_provider, "gemini");
    assert_eq!(config.providers.gemini.model.as_deref(), Some("gemini-1.5-flash"));
    assert_eq!(config.providers.openai.model, None);
    assert_eq!(config.providers.developer.as_deref(), Some("anthropic"));
}

#[test]
fn test_override_with_unknown_provider_fails() {
    let mut config = Config::default();
    let result = config.apply_overrides(&Overrides {
        provider: Some("nobody".to_string()),
        ..Default::default()
    });
    assert!(result.is_err());
}

#[test]
fn test_default_roles_follow_registration() {
    let config = Config::default();

    let roles = config.resolve_roles(&["anthropic", "gemini", "openai"]);
    assert_eq!(
        roles,
        RoleAssignment {
            architect: Some("gemini".to_string()),
            developer: Some("openai".to_string()),
        }
    );

    let roles = config.resolve_roles(&["anthropic"]);
    assert_eq!(roles.architect, None);
    assert_eq!(roles.developer.as_deref(), Some("anthropic"));

    let roles = config.resolve_roles(&["gemini"]);
    assert_eq!(roles.architect.as_deref(), Some("gemini"));
    assert_eq!(roles.developer, None);
}

#[test]
fn test_developer_falls_back_to_compatible_provider() {
    let config = Config::default();
    let roles = config.resolve_roles(&["gemini", "groq"]);
    assert_eq!(roles.developer.as_deref(), Some("groq"));
}

#[test]
fn test_explicit_role_that_did_not_register_is_dropped() {
    let mut config = Config::default();
    config.providers.architect = Some("anthropic".to_string());

    let roles = config.resolve_roles(&["openai", "gemini"]);
    assert_eq!(roles.architect, None);
    assert_eq!(roles.developer.as_deref(), Some("openai"));
}

#[test]
fn test_credentials_prefer_explicit_key() {
    let creds = Credentials::from_pairs([(Credentials::OPENAI, "env-key"), (Credentials::GEMINI, "  ")]);

    assert_eq!(creds.resolve(Some("file-key"), Credentials::OPENAI).as_deref(), Some("file-key"));
    assert_eq!(creds.resolve(None, Credentials::OPENAI).as_deref(), Some("env-key"));
    assert_eq!(creds.resolve(Some(""), Credentials::OPENAI).as_deref(), Some("env-key"));
    // Blank values count as absent
    assert_eq!(creds.resolve(None, Credentials::GEMINI), None);
}

#[test]
fn test_project_dir_is_resolved_against_workspace() {
    let config = Config::default();
    assert_eq!(
        config.project_dir(Path::new("/work")),
        Path::new("/work").join("project")
    );
}

#[test]
fn test_default_config_paths_start_local_then_user_dirs() {
    let paths = default_config_paths();
    assert_eq!(paths[0], Path::new("./tandem.toml"));
    assert!(paths[1..].iter().all(|p| p.ends_with("tandem/config.toml")));

    if let Some(config_dir) = dirs::config_dir() {
        assert_eq!(paths[1], config_dir.join("tandem/config.toml"));
    }
    let mut unique = paths.clone();
    unique.dedup();
    assert_eq!(unique.len(), paths.len());
}
