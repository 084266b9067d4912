//! Autonomous pipeline tests: architect analysis and plan, developer execution.

use std::sync::Arc;
use tandem_config::RoleAssignment;
use tandem_core::prompts::DEVELOPER_SYSTEM_PROMPT;
use tandem_core::ui_writer::NullUiWriter;
use tandem_core::{AgentError, AgentPool, AgentSettings, AutonomousPipeline, LLMProvider, MessageRole, Role};
use tandem_providers::mock::{MockProvider, MockResponse};
use tempfile::TempDir;

fn settings(dir: &TempDir) -> AgentSettings {
    AgentSettings {
        project_dir: dir.path().to_path_buf(),
        system_prompt: DEVELOPER_SYSTEM_PROMPT.to_string(),
        max_rounds: 10,
        streaming: false,
        max_retry_attempts: 1,
    }
}

fn pool(dir: &TempDir, providers: &[&MockProvider], active: &str) -> AgentPool {
    let providers: Vec<Arc<dyn LLMProvider>> = providers
        .iter()
        .map(|p| Arc::new((*p).clone()) as Arc<dyn LLMProvider>)
        .collect();
    AgentPool::from_providers(providers, &settings(dir), Some(active)).unwrap()
}

fn roles(architect: Option<&str>, developer: Option<&str>) -> RoleAssignment {
    RoleAssignment {
        architect: architect.map(str::to_string),
        developer: developer.map(str::to_string),
    }
}

#[tokio::test]
async fn test_without_architect_runs_request_directly() {
    let dir = TempDir::new().unwrap();
    let gemini = MockProvider::new().with_name("gemini");
    let openai = MockProvider::new()
        .with_name("openai")
        .with_response(MockResponse::text("```file:hello.py\nprint('hello')\n```"));
    let mut pool = pool(&dir, &[&gemini, &openai], "openai");

    let pipeline = AutonomousPipeline::new(roles(None, Some("openai")), DEVELOPER_SYSTEM_PROMPT);
    let report = pipeline.run(&mut pool, "write hello.py", &NullUiWriter).await.unwrap();

    assert_eq!(report.direct_provider.as_deref(), Some("openai"));
    assert!(report.analysis.is_none());
    assert!(report.plan.is_none());
    assert_eq!(report.files_written, vec!["hello.py".to_string()]);
    assert_eq!(openai.request_count(), 1);
    assert_eq!(gemini.request_count(), 0);
}

/// An architect assigned by name but not registered counts as absent.
#[tokio::test]
async fn test_unregistered_architect_falls_back_to_direct() {
    let dir = TempDir::new().unwrap();
    let openai = MockProvider::new().with_name("openai").with_response(MockResponse::text("ok"));
    let mut pool = pool(&dir, &[&openai], "openai");

    let pipeline = AutonomousPipeline::new(roles(Some("gemini"), Some("openai")), DEVELOPER_SYSTEM_PROMPT);
    let report = pipeline.run(&mut pool, "anything", &NullUiWriter).await.unwrap();

    assert_eq!(report.direct_provider.as_deref(), Some("openai"));
    assert_eq!(report.responses, vec!["ok".to_string()]);
}

#[tokio::test]
async fn test_missing_developer_stops_after_plan() {
    let dir = TempDir::new().unwrap();
    let gemini = MockProvider::new().with_name("gemini").with_responses(vec![
        MockResponse::text("The project is empty."),
        MockResponse::text("```file:main.py\nprint('plan')\n```"),
    ]);
    let mut pool = pool(&dir, &[&gemini], "gemini");

    let pipeline = AutonomousPipeline::new(roles(Some("gemini"), None), DEVELOPER_SYSTEM_PROMPT);
    let err = pipeline.run(&mut pool, "build it", &NullUiWriter).await.unwrap_err();

    assert!(matches!(err, AgentError::RoleUnavailable(Role::Developer)));
    assert_eq!(gemini.request_count(), 2);
    assert!(!dir.path().join("main.py").exists());
}

#[tokio::test]
async fn test_architect_plan_is_carried_out_by_developer() {
    let dir = TempDir::new().unwrap();
    let gemini = MockProvider::new()
        .with_name("gemini")
        .with_native_tool_calling(true)
        .with_responses(vec![
            MockResponse::text("No models or views exist yet."),
            MockResponse::text("Create the model.\n---\nCreate the view."),
        ]);
    let openai = MockProvider::new().with_name("openai").with_responses(vec![
        MockResponse::text("```file:models/user.py\nclass User:\n    pass\n```"),
        MockResponse::text("```file:views/user_view.py\nfrom models.user import User\n```"),
    ]);
    let mut pool = pool(&dir, &[&gemini, &openai], "openai");

    let pipeline = AutonomousPipeline::new(roles(Some("gemini"), Some("openai")), DEVELOPER_SYSTEM_PROMPT);
    let report = pipeline.run(&mut pool, "add a user page", &NullUiWriter).await.unwrap();

    assert_eq!(report.direct_provider, None);
    assert_eq!(report.analysis.as_deref(), Some("No models or views exist yet."));
    assert_eq!(report.files_written, vec!["models/user.py".to_string(), "views/user_view.py".to_string()]);
    assert!(report.failed_writes.is_empty());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("models/user.py")).unwrap(),
        "class User:\n    pass"
    );

    // Architect: analysis then plan, never offered tools
    let architect_requests = gemini.get_requests();
    assert_eq!(architect_requests.len(), 2);
    assert!(architect_requests.iter().all(|r| r.tools.is_none()));
    let first_user = architect_requests[0]
        .messages
        .iter()
        .find(|m| m.role == MessageRole::User)
        .unwrap();
    assert!(first_user.content.starts_with("Analyze the project."));
    assert!(first_user.content.contains("add a user page"));
    let plan_request = architect_requests[1].messages.last().unwrap();
    assert!(plan_request.content.starts_with("Based on your analysis"));
    assert!(plan_request.content.contains("No models or views exist yet."));

    // Developer: one turn per plan segment, in one conversation
    let developer_requests = openai.get_requests();
    assert_eq!(developer_requests.len(), 2);
    assert_eq!(developer_requests[0].messages.last().unwrap().content, "Create the model.");
    assert_eq!(developer_requests[1].messages.last().unwrap().content, "Create the view.");
    assert!(developer_requests[1]
        .messages
        .iter()
        .any(|m| m.content == "Create the model."));
}

#[tokio::test]
async fn test_architect_failure_ends_run_without_writes() {
    let dir = TempDir::new().unwrap();
    let gemini = MockProvider::new()
        .with_name("gemini")
        .with_response(MockResponse::error("403 forbidden"));
    let openai = MockProvider::new().with_name("openai");
    let mut pool = pool(&dir, &[&gemini, &openai], "openai");

    let pipeline = AutonomousPipeline::new(roles(Some("gemini"), Some("openai")), DEVELOPER_SYSTEM_PROMPT);
    let err = pipeline.run(&mut pool, "build it", &NullUiWriter).await.unwrap_err();

    assert!(matches!(err, AgentError::ProviderUnavailable { .. }));
    assert_eq!(openai.request_count(), 0);
}
