//! JSON schema for the `text_editor` tool declared to providers with native
//! tool calling.

use serde_json::json;
use tandem_providers::Tool;

pub const TEXT_EDITOR_TOOL: &str = "text_editor";

/// Commands accepted by `text_editor`, in schema order.
pub const EDITOR_COMMANDS: [&str; 9] = [
    "view",
    "str_replace",
    "create",
    "insert",
    "undo_edit",
    "list_files",
    "delete_file",
    "delete_directory",
    "create_directory",
];

pub fn create_tool_definitions() -> Vec<Tool> {
    vec![text_editor_tool()]
}

fn text_editor_tool() -> Tool {
    Tool {
        name: TEXT_EDITOR_TOOL.to_string(),
        description: "View, create and edit files in the project. `command` and `path` are always \
                      required; str_replace needs old_str and new_str, insert needs insert_line and \
                      new_str."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "enum": EDITOR_COMMANDS,
                    "description": "The editing operation to perform"
                },
                "path": {
                    "type": "string",
                    "description": "The file or directory path, relative to the project"
                },
                "old_str": {
                    "type": "string",
                    "description": "Exact text to replace; must occur exactly once in the file"
                },
                "new_str": {
                    "type": "string",
                    "description": "Replacement text for str_replace, or the text to insert"
                },
                "insert_line": {
                    "type": "integer",
                    "description": "1-indexed line to insert before; line count + 1 appends"
                },
                "file_text": {
                    "type": "string",
                    "description": "Initial content for create (defaults to empty)"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "For list_files: include files in subdirectories"
                }
            },
            "required": ["command", "path"]
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_editor_schema() {
        let tools = create_tool_definitions();
        assert_eq!(tools.len(), 1);

        let schema = &tools[0].input_schema;
        assert_eq!(tools[0].name, "text_editor");
        assert_eq!(schema["required"], json!(["command", "path"]));
        assert_eq!(schema["properties"]["command"]["enum"].as_array().unwrap().len(), 9);
        assert_eq!(schema["properties"]["insert_line"]["type"], "integer");
    }
}
