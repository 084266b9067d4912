//! System prompts and the fixed autonomous-mode prompts.

use std::path::Path;
use tracing::{debug, warn};

pub const DEVELOPER_SYSTEM_PROMPT: &str = "\
You are an expert software developer. You implement the designs and plans handed \
to you, modify files precisely and check that the code you write is correct.

You can edit the project through the `text_editor` tool:

1. view - Show the contents of a file. Always view a file before changing it.
   {\"command\": \"view\", \"path\": \"src/main.py\"}
2. str_replace - Replace text in a file. `old_str` must match exactly once, \
including whitespace and indentation.
   {\"command\": \"str_replace\", \"path\": \"src/main.py\", \"old_str\": \"old\", \"new_str\": \"new\"}
3. create - Create a new file, optionally with `file_text`.
   {\"command\": \"create\", \"path\": \"src/new.py\", \"file_text\": \"print('hi')\"}
4. insert - Insert `new_str` before 1-indexed `insert_line`.
   {\"command\": \"insert\", \"path\": \"src/main.py\", \"insert_line\": 5, \"new_str\": \"x = 1\"}
5. undo_edit - Restore a file to its state before your first edit to it.
6. list_files - List a directory; set `recursive` to include subdirectories.
7. delete_file - Delete a file.
8. delete_directory - Delete an empty directory.
9. create_directory - Create a directory.

When you cannot call tools, write each complete file as a fenced block tagged \
with its path and it will be saved for you:

```file:src/main.py
print('hello')
```
";

pub const ARCHITECT_SYSTEM_PROMPT: &str = "\
You are a software architect. You analyze projects and produce concrete, \
actionable plans for a developer to implement. You do not edit files yourself. \
Describe each file to create, modify or delete. Separate independent steps of a \
plan with a line containing only `---`. When a step needs new file contents, \
write them as a fenced block opened with ```file:<relative/path>.";

const ANALYSIS_PROMPT: &str = "Analyze the project.";

const PLAN_PROMPT: &str = "Based on your analysis, provide a detailed plan including specific file \
creations, modifications, and deletions:";

/// First architect turn: the fixed analysis request plus what the user asked for.
pub fn analysis_prompt(request: &str) -> String {
    let request = request.trim();
    if request.is_empty() {
        ANALYSIS_PROMPT.to_string()
    } else {
        format!("{}\n\nRequest: {}", ANALYSIS_PROMPT, request)
    }
}

/// Second architect turn, embedding the analysis.
pub fn plan_prompt(analysis: &str) -> String {
    format!("{}\n{}", PLAN_PROMPT, analysis)
}

/// The developer prompt, replaced by the contents of `override_file` when
/// that file exists and is not blank.
pub fn developer_system_prompt(override_file: Option<&Path>) -> String {
    let Some(path) = override_file else {
        return DEVELOPER_SYSTEM_PROMPT.to_string();
    };

    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => {
            debug!("Using system prompt from {}", path.display());
            content
        }
        Ok(_) => DEVELOPER_SYSTEM_PROMPT.to_string(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => DEVELOPER_SYSTEM_PROMPT.to_string(),
        Err(e) => {
            warn!("Could not read system prompt {}: {}", path.display(), e);
            DEVELOPER_SYSTEM_PROMPT.to_string()
        }
    }
}
