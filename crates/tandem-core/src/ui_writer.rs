/// Interface for UI output operations.
///
/// Core logic reports progress through this trait so the console front end
/// (or a test) decides how it is shown.
pub trait UiWriter: Send + Sync {
    /// Print a message with a newline
    fn println(&self, message: &str);

    /// Print without newline (for streamed text)
    fn print_inline(&self, message: &str);

    /// Print a tool execution header before the tool runs
    fn print_tool_header(&self, tool_name: &str, tool_args: Option<&serde_json::Value>);

    /// Print the text a tool returned
    fn print_tool_result(&self, text: &str, is_error: bool);

    /// Print a note about a file written from a code block
    fn print_file_write(&self, path: &str, error: Option<&str>);

    /// Print a pipeline stage banner (analysis, plan, development)
    fn print_stage(&self, stage: &str);

    fn flush(&self);
}

/// A no-op implementation for when UI output is not needed
pub struct NullUiWriter;

impl UiWriter for NullUiWriter {
    fn println(&self, _message: &str) {}
    fn print_inline(&self, _message: &str) {}
    fn print_tool_header(&self, _tool_name: &str, _tool_args: Option<&serde_json::Value>) {}
    fn print_tool_result(&self, _text: &str, _is_error: bool) {}
    fn print_file_write(&self, _path: &str, _error: Option<&str>) {}
    fn print_stage(&self, _stage: &str) {}
    fn flush(&self) {}
}
