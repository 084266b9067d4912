//! Conversation state owned by one agent.

use tandem_providers::{Message, MessageRole, ToolCall};

/// Append-only message history plus the system prompt sent ahead of it.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: String,
    system_prompt: String,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Full message list for a provider request, system prompt first.
    pub fn request_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        if !self.system_prompt.is_empty() {
            messages.push(Message::system(self.system_prompt.clone()));
        }
        messages.extend(self.messages.iter().cloned());
        messages
    }

    /// Tool calls carried by the latest message, if it is an assistant turn.
    pub fn pending_tool_calls(&self) -> Vec<ToolCall> {
        match self.messages.last() {
            Some(msg) if msg.role == MessageRole::Assistant => msg.tool_calls.clone(),
            _ => Vec::new(),
        }
    }

    /// Text of the most recent assistant turn.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.as_str())
    }

    /// Human-readable transcript, one line per message.
    pub fn history(&self) -> Vec<String> {
        self.messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                    MessageRole::Tool => "tool",
                };
                if msg.has_tool_calls() {
                    let names: Vec<&str> = msg.tool_calls.iter().map(|c| c.name.as_str()).collect();
                    format!("{}: {} [tool calls: {}]", role, msg.content, names.join(", "))
                } else {
                    format!("{}: {}", role, msg.content)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_messages_lead_with_system_prompt() {
        let mut conversation = Conversation::new("be helpful");
        conversation.push(Message::user("hi"));

        let messages = conversation.request_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].content, "hi");
    }

    #[test]
    fn test_pending_tool_calls_only_from_last_assistant_turn() {
        let mut conversation = Conversation::new("");
        let call = ToolCall::new("1", "text_editor", &json!({"command": "view", "path": "a"}));
        conversation.push(Message::assistant("", vec![call.clone()]));
        assert_eq!(conversation.pending_tool_calls(), vec![call]);

        conversation.push(Message::tool_result("1", "contents"));
        assert!(conversation.pending_tool_calls().is_empty());
        assert!(conversation.request_messages().iter().all(|m| m.role != MessageRole::System));
    }
}
