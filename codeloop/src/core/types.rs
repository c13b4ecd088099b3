//! Shared data model for the agent loop.
//!
//! These types define stable contracts between the runner, the LLM client, and
//! tools. They carry no I/O and serialize to the wire shapes tools and
//! transcripts use.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::StandardizedToolError;

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// One entry in a run's append-only conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name for `tool` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, content)
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::Assistant, content)
    }

    /// Assistant turn that requested a tool. `content` holds any prose the
    /// model emitted alongside the call.
    pub fn assistant_call(content: impl Into<String>, call: FunctionCall) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_call_id: call.id.clone(),
            tool_call: Some(call),
            name: None,
        }
    }

    pub fn tool(call: &FunctionCall, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_call: None,
            tool_call_id: call.id.clone(),
            name: Some(call.name.clone()),
        }
    }

    fn plain(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call: None,
            tool_call_id: None,
            name: None,
        }
    }
}

/// A structured request, emitted by the LLM, to invoke a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Normalized LLM output: either final text or exactly one function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FunctionCallResponse {
    Text(String),
    FunctionCall(FunctionCall),
}

impl FunctionCallResponse {
    pub fn is_text_response(&self) -> bool {
        matches!(self, FunctionCallResponse::Text(_))
    }

    pub fn text_content(&self) -> Option<&str> {
        match self {
            FunctionCallResponse::Text(text) => Some(text),
            FunctionCallResponse::FunctionCall(_) => None,
        }
    }

    pub fn function_call(&self) -> Option<&FunctionCall> {
        match self {
            FunctionCallResponse::Text(_) => None,
            FunctionCallResponse::FunctionCall(call) => Some(call),
        }
    }
}

/// Outcome of one tool execution, as reinjected into the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standardized_error: Option<StandardizedToolError>,
}

impl ToolResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            standardized_error: None,
        }
    }

    /// Failure carrying only a bare error string.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            standardized_error: None,
        }
    }

    pub fn from_error(err: StandardizedToolError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.message.clone()),
            standardized_error: Some(err),
        }
    }

    /// Content of the tool message the LLM sees for this result.
    pub fn render_for_llm(&self) -> String {
        if self.success {
            return match &self.data {
                None | Some(Value::Null) => "OK".to_string(),
                Some(Value::String(text)) => text.clone(),
                Some(other) => {
                    serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())
                }
            };
        }
        if let Some(err) = &self.standardized_error {
            return err.render();
        }
        match self.error.as_deref() {
            Some(error) if !error.trim().is_empty() => format!("Error: {error}"),
            _ => "Error: tool failed without an error message".to_string(),
        }
    }
}

/// LLM-facing projection of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Workflow role a runner is configured for. Each role gets its own tool
/// registry and budget; the loop itself never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowRole {
    Planning,
    Generation,
    Review,
}

impl WorkflowRole {
    pub const ALL: [WorkflowRole; 3] = [
        WorkflowRole::Planning,
        WorkflowRole::Generation,
        WorkflowRole::Review,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowRole::Planning => "planning",
            WorkflowRole::Generation => "generation",
            WorkflowRole::Review => "review",
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    Success,
    MaxIterations,
    Error,
    Cancelled,
}

impl TerminalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminalStatus::Success => "success",
            TerminalStatus::MaxIterations => "max_iterations",
            TerminalStatus::Error => "error",
            TerminalStatus::Cancelled => "cancelled",
        }
    }
}

/// Terminal output of a run. `messages` is the full transcript, on every path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub status: TerminalStatus,
    pub success: bool,
    pub iterations: u32,
    pub tool_calls: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorCode;
    use serde_json::json;

    #[test]
    fn response_accessors_are_mutually_exclusive() {
        let text = FunctionCallResponse::Text("done".to_string());
        assert!(text.is_text_response());
        assert_eq!(text.text_content(), Some("done"));
        assert!(text.function_call().is_none());

        let call = FunctionCallResponse::FunctionCall(FunctionCall::new("read_file", json!({})));
        assert!(!call.is_text_response());
        assert!(call.text_content().is_none());
        assert_eq!(call.function_call().map(|c| c.name.as_str()), Some("read_file"));
    }

    #[test]
    fn tool_result_serializes_wire_shape() {
        let result = ToolResult::from_error(StandardizedToolError::file_not_found("a.go"));
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["standardized_error"]["code"], json!("FILE_NOT_FOUND"));
        assert!(value["standardized_error"]["suggestion_for_llm"].is_string());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn render_for_llm_prefers_standardized_error() {
        let result = ToolResult::from_error(StandardizedToolError::new(
            ErrorCode::InvalidLineRange,
            "start_line 9 is past end of file",
            "Read the file without a range first.",
        ));
        let rendered = result.render_for_llm();
        assert!(rendered.contains("INVALID_LINE_RANGE"));
        assert!(rendered.contains("Read the file without a range first."));
    }

    #[test]
    fn render_for_llm_uses_bare_error_string() {
        let result = ToolResult::failure("file not found");
        assert_eq!(result.render_for_llm(), "Error: file not found");
    }

    #[test]
    fn render_for_llm_passes_string_data_through() {
        let result = ToolResult::ok(json!("hello"));
        assert_eq!(result.render_for_llm(), "hello");
        assert_eq!(ToolResult::ok(Value::Null).render_for_llm(), "OK");
    }
}
