use std::io::{self, Write};
use tandem_core::ui_writer::UiWriter;

/// Lines of tool output shown before the rest is summarized
const MAX_TOOL_OUTPUT_LINES: usize = 8;
const MAX_HEADER_VALUE_LEN: usize = 80;

/// Console implementation of UiWriter that prints to stdout
pub struct ConsoleUiWriter;

impl ConsoleUiWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleUiWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// The header shows the command and path of a `text_editor` call, or the
/// first argument of any other tool.
fn header_summary(tool_args: Option<&serde_json::Value>) -> Option<String> {
    let args = tool_args?.as_object()?;
    let command = args.get("command").and_then(|v| v.as_str());
    let path = args.get("path").and_then(|v| v.as_str());

    let summary = match (command, path) {
        (Some(command), Some(path)) => format!("{} {}", command, path),
        (Some(command), None) => command.to_string(),
        (None, Some(path)) => path.to_string(),
        (None, None) => {
            let (key, value) = args.iter().next()?;
            format!("{}={}", key, value)
        }
    };

    let first_line = summary.lines().next().unwrap_or_default();
    Some(truncate(first_line, MAX_HEADER_VALUE_LEN))
}

fn truncate(line: &str, max: usize) -> String {
    if line.chars().count() <= max {
        return line.to_string();
    }
    let cut: String = line.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

impl UiWriter for ConsoleUiWriter {
    fn println(&self, message: &str) {
        println!("{}", message);
    }

    fn print_inline(&self, message: &str) {
        print!("{}", message);
        let _ = io::stdout().flush();
    }

    fn print_tool_header(&self, tool_name: &str, tool_args: Option<&serde_json::Value>) {
        println!();
        match header_summary(tool_args) {
            Some(summary) => println!("┌─\x1b[1;32m {}\x1b[0m\x1b[35m | {}\x1b[0m", tool_name, summary),
            None => println!("┌─\x1b[1;32m {}\x1b[0m", tool_name),
        }
    }

    fn print_tool_result(&self, text: &str, is_error: bool) {
        let lines: Vec<&str> = text.lines().collect();
        let color = if is_error { "\x1b[31m" } else { "\x1b[2m" };

        for line in lines.iter().take(MAX_TOOL_OUTPUT_LINES) {
            println!("│ {}{}\x1b[0m", color, line);
        }
        if lines.len() > MAX_TOOL_OUTPUT_LINES {
            println!("│ \x1b[2m({} more lines)\x1b[0m", lines.len() - MAX_TOOL_OUTPUT_LINES);
        }
        println!("└─");
    }

    fn print_file_write(&self, path: &str, error: Option<&str>) {
        match error {
            None => println!("\x1b[32m✎ wrote {}\x1b[0m", path),
            Some(error) => println!("\x1b[31m✗ could not write {}: {}\x1b[0m", path, error),
        }
    }

    fn print_stage(&self, stage: &str) {
        println!();
        println!("\x1b[1;35m== {} ==\x1b[0m", stage);
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_summary_prefers_command_and_path() {
        let args = json!({"command": "create", "path": "src/app.py", "file_text": "x"});
        assert_eq!(header_summary(Some(&args)).as_deref(), Some("create src/app.py"));
        assert_eq!(header_summary(None), None);
    }

    #[test]
    fn test_long_values_are_truncated() {
        let long = "a".repeat(200);
        let args = json!({"query": long});
        let summary = header_summary(Some(&args)).unwrap();
        assert_eq!(summary.chars().count(), MAX_HEADER_VALUE_LEN);
        assert!(summary.ends_with("..."));
    }
}
