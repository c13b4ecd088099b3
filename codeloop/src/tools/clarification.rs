//! `request_human_clarification`: lets the LLM pause instead of guessing.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::core::clarification::{CLARIFICATION_TOOL_NAME, ClarificationRequest, Urgency};
use crate::core::types::ToolResult;
use crate::tools::{Tool, parse_params};

const DESCRIPTION: &str = "Ask the human operator a question when the request is ambiguous.
Use this only when a wrong guess would waste significant work. Provide a specific question,
a short summary of what you know so far, your confidence in your current best guess
(0.0 to 1.0), an urgency, and concrete options when you have them.
Example: {\"question\": \"Should the new endpoint require auth?\", \"confidence\": 0.4,
\"urgency\": \"medium\", \"suggested_options\": [\"require auth\", \"public\"]}
The human's answer arrives as the next user message.";

#[derive(Debug, Deserialize)]
struct Params {
    question: String,
    #[serde(default)]
    context_summary: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    urgency: Urgency,
    #[serde(default)]
    suggested_options: Vec<String>,
}

fn default_confidence() -> f64 {
    0.5
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClarificationTool;

#[async_trait]
impl Tool for ClarificationTool {
    fn name(&self) -> &str {
        CLARIFICATION_TOOL_NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {"type": "string", "minLength": 1},
                "context_summary": {"type": "string"},
                "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                "urgency": {"type": "string", "enum": ["low", "medium", "high", "critical"]},
                "suggested_options": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["question"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, _cancel: &CancellationToken, params: Value) -> Result<ToolResult> {
        let params: Params = match parse_params(self.name(), params) {
            Ok(params) => params,
            Err(err) => return Ok(ToolResult::from_error(err)),
        };
        let request = ClarificationRequest {
            clarification_needed: true,
            question: params.question.trim().to_string(),
            context_summary: params.context_summary,
            confidence: params.confidence,
            urgency: params.urgency,
            suggested_options: params.suggested_options,
        };
        Ok(ToolResult::ok(request.to_data()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clarification::detect;
    use crate::core::schema::validate_arguments;

    #[tokio::test]
    async fn execute_emits_clarification_marker() {
        let tool = ClarificationTool;
        let args = validate_arguments(
            tool.name(),
            &tool.parameter_schema(),
            &json!({
                "question": "Which option?",
                "urgency": "high",
                "suggested_options": ["one", "two"]
            }),
        )
        .expect("valid");

        let result = tool
            .execute(&CancellationToken::new(), args)
            .await
            .expect("execute");
        let request = detect(&result).expect("clarification marker");
        assert_eq!(request.question, "Which option?");
        assert_eq!(request.urgency, Urgency::High);
        assert_eq!(request.suggested_options, vec!["one", "two"]);
        assert!((request.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn schema_rejects_unknown_urgency() {
        let tool = ClarificationTool;
        let err = validate_arguments(
            tool.name(),
            &tool.parameter_schema(),
            &json!({"question": "q", "urgency": "whenever"}),
        )
        .unwrap_err();
        assert_eq!(err.code, crate::core::errors::ErrorCode::InvalidParameter);
    }
}
