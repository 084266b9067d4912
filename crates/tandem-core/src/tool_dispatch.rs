//! Tool dispatch - routes tool calls to their implementations.
//!
//! Every call yields exactly one [`ToolResult`]. Edit failures, malformed
//! arguments and unknown tool names all come back as result text for the
//! model to read; nothing here aborts the conversation.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::editor::{CreateMode, FileEditor};
use crate::error::AgentError;
use crate::tool_definitions::{create_tool_definitions, TEXT_EDITOR_TOOL};
use tandem_providers::{Tool, ToolCall};

/// An additional tool the model may call by name.
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> Tool;

    fn call(&self, arguments: &Value) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub text: String,
    pub is_error: bool,
}

impl ToolResult {
    fn ok(call: &ToolCall, text: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            text: text.into(),
            is_error: false,
        }
    }

    fn error(call: &ToolCall, text: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            text: format!("Error: {}", text.into()),
            is_error: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EditorCommand {
    View,
    StrReplace,
    Create,
    Insert,
    UndoEdit,
    ListFiles,
    DeleteFile,
    DeleteDirectory,
    CreateDirectory,
}

#[derive(Debug, Deserialize)]
struct TextEditorArgs {
    command: EditorCommand,
    path: String,
    old_str: Option<String>,
    new_str: Option<String>,
    insert_line: Option<usize>,
    file_text: Option<String>,
    #[serde(default)]
    recursive: bool,
}

/// Tools available to one agent: the built-in `text_editor` over its own
/// [`FileEditor`], plus any registered handlers.
pub struct ToolRegistry {
    editor: FileEditor,
    handlers: BTreeMap<String, Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new(editor: FileEditor) -> Self {
        Self {
            editor,
            handlers: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, handler: Box<dyn ToolHandler>) {
        let name = handler.definition().name;
        if name == TEXT_EDITOR_TOOL {
            warn!("Ignoring handler that shadows the built-in text_editor tool");
            return;
        }
        self.handlers.insert(name, handler);
    }

    pub fn editor(&self) -> &FileEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut FileEditor {
        &mut self.editor
    }

    pub fn definitions(&self) -> Vec<Tool> {
        let mut tools = create_tool_definitions();
        tools.extend(self.handlers.values().map(|h| h.definition()));
        tools
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions().into_iter().map(|t| t.name).collect()
    }

    /// Execute calls strictly in the order given, one result per call.
    pub fn dispatch_all(&mut self, calls: &[ToolCall]) -> Vec<ToolResult> {
        calls.iter().map(|call| self.dispatch(call)).collect()
    }

    pub fn dispatch(&mut self, call: &ToolCall) -> ToolResult {
        debug!("Dispatching tool: {} ({})", call.name, call.id);

        if call.name == TEXT_EDITOR_TOOL {
            return self.dispatch_text_editor(call);
        }

        let Some(handler) = self.handlers.get(&call.name) else {
            warn!("Unknown tool requested: {}", call.name);
            return ToolResult::error(call, format!("Unknown tool: {}", call.name));
        };

        let arguments = match parse_arguments(call) {
            Ok(value) => value,
            Err(e) => return ToolResult::error(call, e.to_string()),
        };
        match handler.call(&arguments) {
            Ok(text) => ToolResult::ok(call, text),
            Err(e) => ToolResult::error(call, e.to_string()),
        }
    }

    fn dispatch_text_editor(&mut self, call: &ToolCall) -> ToolResult {
        let args: TextEditorArgs = match parse_arguments(call)
            .and_then(|value| serde_json::from_value(value).map_err(|e| malformed(call, e)))
        {
            Ok(args) => args,
            Err(e) => {
                warn!("{}", e);
                return ToolResult::error(call, e.to_string());
            }
        };

        match self.run_editor_command(call, args) {
            Ok(text) => ToolResult::ok(call, text),
            Err(e) => ToolResult::error(call, e.to_string()),
        }
    }

    fn run_editor_command(&mut self, call: &ToolCall, args: TextEditorArgs) -> Result<String, AgentError> {
        let path = args.path.as_str();
        let editor = &mut self.editor;

        let text = match args.command {
            EditorCommand::View => editor.view(path)?,
            EditorCommand::StrReplace => {
                let old_str = require(call, "old_str", args.old_str)?;
                let new_str = require(call, "new_str", args.new_str)?;
                editor.str_replace(path, &old_str, &new_str)?;
                format!("Replaced text in '{}'.", path)
            }
            EditorCommand::Create => {
                let content = args.file_text.unwrap_or_default();
                editor.create(path, &content, CreateMode::Strict)?;
                format!("File '{}' created.", path)
            }
            EditorCommand::Insert => {
                let line = require(call, "insert_line", args.insert_line)?;
                let new_str = require(call, "new_str", args.new_str)?;
                editor.insert(path, line, &new_str)?;
                format!("Inserted text at line {} of '{}'.", line, path)
            }
            EditorCommand::UndoEdit => {
                editor.undo(path)?;
                format!("Undid edits to '{}'.", path)
            }
            EditorCommand::ListFiles => {
                let entries = editor.list_files(path, args.recursive)?;
                format!("Files in '{}':\n{}", path, entries.join("\n"))
            }
            EditorCommand::DeleteFile => {
                editor.delete_file(path)?;
                format!("File '{}' deleted.", path)
            }
            EditorCommand::DeleteDirectory => {
                editor.delete_directory(path)?;
                format!("Directory '{}' deleted.", path)
            }
            EditorCommand::CreateDirectory => {
                editor.create_directory(path)?;
                format!("Directory '{}' created.", path)
            }
        };

        Ok(text)
    }
}

fn parse_arguments(call: &ToolCall) -> Result<Value, AgentError> {
    let raw = if call.arguments.trim().is_empty() {
        "{}"
    } else {
        call.arguments.as_str()
    };
    serde_json::from_str(raw).map_err(|e| malformed(call, e))
}

fn malformed(call: &ToolCall, error: impl std::fmt::Display) -> AgentError {
    AgentError::MalformedToolArguments {
        tool: call.name.clone(),
        message: error.to_string(),
    }
}

fn require<T>(call: &ToolCall, field: &str, value: Option<T>) -> Result<T, AgentError> {
    value.ok_or_else(|| malformed(call, format!("missing required field '{}'", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn registry() -> (TempDir, ToolRegistry) {
        let temp_dir = TempDir::new().unwrap();
        let registry = ToolRegistry::new(FileEditor::new(temp_dir.path()));
        (temp_dir, registry)
    }

    fn call(id: &str, args: Value) -> ToolCall {
        ToolCall::new(id, TEXT_EDITOR_TOOL, &args)
    }

    struct EchoTool;

    impl ToolHandler for EchoTool {
        fn definition(&self) -> Tool {
            Tool {
                name: "echo".to_string(),
                description: "Echo the message back".to_string(),
                input_schema: json!({"type": "object"}),
            }
        }

        fn call(&self, arguments: &Value) -> anyhow::Result<String> {
            Ok(arguments["message"].as_str().unwrap_or_default().to_string())
        }
    }

    #[test]
    fn test_create_then_view() {
        let (_dir, mut registry) = registry();
        let results = registry.dispatch_all(&[
            call("1", json!({"command": "create", "path": "a.txt", "file_text": "hello"})),
            call("2", json!({"command": "view", "path": "a.txt"})),
        ]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tool_call_id, "1");
        assert!(!results[0].is_error);
        assert_eq!(results[1].text, "hello");
    }

    #[test]
    fn test_edit_errors_become_result_text() {
        let (_dir, mut registry) = registry();
        let result = registry.dispatch(&call("1", json!({"command": "view", "path": "missing.txt"})));

        assert!(result.is_error);
        assert!(result.text.starts_with("Error: File not found"));
    }

    #[test]
    fn test_malformed_json_becomes_result_text() {
        let (_dir, mut registry) = registry();
        let bad = ToolCall {
            id: "bad".to_string(),
            name: TEXT_EDITOR_TOOL.to_string(),
            arguments: "{\"command\": \"view\", ".to_string(),
        };

        let result = registry.dispatch(&bad);
        assert!(result.is_error);
        assert!(result.text.contains("Malformed arguments for tool 'text_editor'"));
    }

    #[test]
    fn test_missing_command_field_is_malformed() {
        let (_dir, mut registry) = registry();
        let result = registry.dispatch(&call("1", json!({"command": "str_replace", "path": "a.txt"})));
        assert!(result.text.contains("old_str"));

        let result = registry.dispatch(&call("2", json!({"command": "explode", "path": "a.txt"})));
        assert!(result.is_error);
    }

    #[test]
    fn test_unknown_tool() {
        let (_dir, mut registry) = registry();
        let result = registry.dispatch(&ToolCall::new("1", "shell", &json!({"command": "ls"})));
        assert_eq!(result.text, "Error: Unknown tool: shell");
    }

    #[test]
    fn test_registered_handler_is_dispatched_and_declared() {
        let (_dir, mut registry) = registry();
        registry.register(Box::new(EchoTool));

        assert_eq!(registry.names(), vec!["text_editor".to_string(), "echo".to_string()]);
        let result = registry.dispatch(&ToolCall::new("1", "echo", &json!({"message": "hi"})));
        assert_eq!(result.text, "hi");
    }
}
