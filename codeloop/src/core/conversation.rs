//! Rendering of the conversation history into the LLM-facing prompt.

use crate::core::types::{Message, MessageRole};

/// Render every non-system message as a role-tagged block, oldest first.
///
/// The system prompt is sent separately, so it is skipped here.
pub fn render_prompt(messages: &[Message]) -> String {
    let blocks: Vec<String> = messages
        .iter()
        .filter(|message| message.role != MessageRole::System)
        .map(render_message)
        .collect();
    blocks.join("\n\n")
}

fn render_message(message: &Message) -> String {
    match (message.role, &message.tool_call) {
        (MessageRole::Assistant, Some(call)) => {
            let mut out = String::new();
            if !message.content.trim().is_empty() {
                out.push_str("[assistant]\n");
                out.push_str(message.content.trim());
                out.push_str("\n\n");
            }
            out.push_str(&format!("[assistant called {}]\n{}", call.name, call.arguments));
            out
        }
        (MessageRole::Tool, _) => {
            let name = message.name.as_deref().unwrap_or("unknown");
            format!("[tool result: {name}]\n{}", message.content)
        }
        (role, _) => format!("[{}]\n{}", role.as_str(), message.content),
    }
}
