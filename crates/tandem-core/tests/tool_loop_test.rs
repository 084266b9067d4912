//! Tool-call loop integration tests driven by MockProvider.

use serde_json::json;
use std::sync::Arc;
use tandem_core::ui_writer::NullUiWriter;
use tandem_core::{Agent, AgentError, AgentSettings, Message, MessageRole};
use tandem_providers::mock::{scenarios, MockProvider, MockResponse};
use tempfile::TempDir;

fn settings(dir: &TempDir, max_rounds: usize) -> AgentSettings {
    AgentSettings {
        project_dir: dir.path().to_path_buf(),
        system_prompt: "You are a test agent.".to_string(),
        max_rounds,
        streaming: false,
        max_retry_attempts: 1,
    }
}

fn count_by_role(messages: &[Message], role: MessageRole) -> usize {
    messages.iter().filter(|m| m.role == role).count()
}

/// A create call, then a plain answer: two round trips, one tool message,
/// the file on disk and the final text returned.
#[tokio::test]
async fn test_tool_call_then_answer() {
    let dir = TempDir::new().unwrap();
    let provider = scenarios::tool_then_response(
        "text_editor",
        json!({"command": "create", "path": "a.txt", "file_text": "alpha"}),
        "done",
    );
    let mut agent = Agent::new(Arc::new(provider.clone()), &settings(&dir, 10));

    let report = agent.respond("create a.txt", &NullUiWriter).await.unwrap();

    assert_eq!(report.text, "done");
    assert_eq!(report.rounds, 2);
    assert_eq!(report.tool_calls, 1);
    assert_eq!(provider.request_count(), 2);
    assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "alpha");

    let messages = agent.conversation().messages();
    assert_eq!(count_by_role(messages, MessageRole::Tool), 1);
    assert_eq!(count_by_role(messages, MessageRole::User), 1);
    assert_eq!(messages.last().unwrap().content, "done");
}

/// The second request carries the tool result linked to the call id.
#[tokio::test]
async fn test_tool_result_is_sent_back_to_provider() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.md"), "remember the milk").unwrap();
    let provider = scenarios::tool_then_response(
        "text_editor",
        json!({"command": "view", "path": "notes.md"}),
        "The file is a reminder.",
    );
    let mut agent = Agent::new(Arc::new(provider.clone()), &settings(&dir, 10));

    agent.respond("what is in notes.md?", &NullUiWriter).await.unwrap();

    let requests = provider.get_requests();
    let second = &requests[1];
    let tool_message = second
        .messages
        .iter()
        .find(|m| m.role == MessageRole::Tool)
        .expect("tool result in second request");
    assert_eq!(tool_message.content, "remember the milk");

    let assistant = second
        .messages
        .iter()
        .find(|m| m.role == MessageRole::Assistant)
        .unwrap();
    assert_eq!(tool_message.tool_call_id.as_deref(), Some(assistant.tool_calls[0].id.as_str()));
}

#[tokio::test]
async fn test_endless_tool_calls_hit_round_ceiling() {
    let dir = TempDir::new().unwrap();
    let provider = scenarios::endless_tool_calls("text_editor", json!({"command": "list_files", "path": "."}));
    let mut agent = Agent::new(Arc::new(provider.clone()), &settings(&dir, 3));

    let err = agent.respond("loop forever", &NullUiWriter).await.unwrap_err();

    assert!(matches!(err, AgentError::LoopNotConverging { rounds: 3 }));
    assert_eq!(provider.request_count(), 3);
}

/// Bad arguments become an error tool result; the loop keeps going and the
/// provider gets to answer.
#[tokio::test]
async fn test_malformed_arguments_do_not_end_the_turn() {
    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new()
        .with_native_tool_calling(true)
        .with_responses(vec![
            MockResponse::malformed_tool_call("text_editor", "{\"command\": \"create\", \"path\""),
            MockResponse::tool_call("text_editor", json!({"command": "str_replace", "path": "x.txt"})),
            MockResponse::text("giving up"),
        ]);
    let mut agent = Agent::new(Arc::new(provider.clone()), &settings(&dir, 10));

    let report = agent.respond("edit x.txt", &NullUiWriter).await.unwrap();

    assert_eq!(report.text, "giving up");
    assert_eq!(report.tool_calls, 2);

    let tool_results: Vec<&Message> = agent
        .conversation()
        .messages()
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .collect();
    assert_eq!(tool_results.len(), 2);
    assert!(tool_results[0].content.starts_with("Error: Malformed arguments for tool 'text_editor'"));
    assert!(tool_results[1].content.contains("old_str"));
}

/// Editor failures are reported to the model, not raised.
#[tokio::test]
async fn test_edit_errors_become_tool_results() {
    let dir = TempDir::new().unwrap();
    let provider = scenarios::tool_then_response(
        "text_editor",
        json!({"command": "view", "path": "missing.txt"}),
        "It does not exist.",
    );
    let mut agent = Agent::new(Arc::new(provider), &settings(&dir, 10));

    let report = agent.respond("view missing.txt", &NullUiWriter).await.unwrap();
    assert_eq!(report.text, "It does not exist.");

    let tool_message = agent
        .conversation()
        .messages()
        .iter()
        .find(|m| m.role == MessageRole::Tool)
        .unwrap();
    assert!(tool_message.content.starts_with("Error: File not found"));
}

/// Without native tool calling no schema is declared and the turn is one round trip.
#[tokio::test]
async fn test_provider_without_tools_is_single_round() {
    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new().with_response(MockResponse::text_then_tool(
        "I would create a file.",
        "text_editor",
        json!({"command": "create", "path": "b.txt"}),
    ));
    let mut agent = Agent::new(Arc::new(provider.clone()), &settings(&dir, 10));

    let report = agent.respond("create b.txt", &NullUiWriter).await.unwrap();

    assert_eq!(report.rounds, 1);
    assert_eq!(report.tool_calls, 0);
    assert!(provider.get_requests()[0].tools.is_none());
    assert!(!dir.path().join("b.txt").exists());
}

#[tokio::test]
async fn test_streaming_turn_records_one_assistant_message() {
    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new().with_response(MockResponse::streaming(vec!["Hel", "lo ", "there"]));
    let mut settings = settings(&dir, 10);
    settings.streaming = true;
    let mut agent = Agent::new(Arc::new(provider), &settings);

    let report = agent.respond("hi", &NullUiWriter).await.unwrap();

    assert_eq!(report.text, "Hello there");
    assert_eq!(count_by_role(agent.conversation().messages(), MessageRole::Assistant), 1);
}

#[tokio::test]
async fn test_provider_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new().with_response(MockResponse::error("401 unauthorized"));
    let mut agent = Agent::new(Arc::new(provider), &settings(&dir, 10));

    let err = agent.respond("hello", &NullUiWriter).await.unwrap_err();
    match err {
        AgentError::ProviderUnavailable { provider, message } => {
            assert_eq!(provider, "mock");
            assert!(message.contains("401"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
