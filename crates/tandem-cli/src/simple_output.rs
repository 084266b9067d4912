use crossterm::style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor};

/// Simple output helper for session messages that are not part of a turn
#[derive(Clone)]
pub struct SimpleOutput;

impl SimpleOutput {
    pub fn new() -> Self {
        SimpleOutput
    }

    pub fn print(&self, message: &str) {
        println!("{}", message);
    }

    /// Format: "tandem: <message>", with the tag in bold green
    pub fn print_status(&self, message: &str) {
        println!(
            "{}{}tandem:{}{} {}",
            SetAttribute(Attribute::Bold),
            SetForegroundColor(Color::Green),
            ResetColor,
            SetAttribute(Attribute::Reset),
            message
        );
    }

    pub fn print_error(&self, message: &str) {
        println!("{}error:{} {}", SetForegroundColor(Color::Red), ResetColor, message);
    }
}

impl Default for SimpleOutput {
    fn default() -> Self {
        Self::new()
    }
}
