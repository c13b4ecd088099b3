//! Clarification marker carried in `ToolResult.data`.
//!
//! The clarification tool returns a payload with `clarification_needed=true`.
//! The runner detects it with [`detect`] and either suspends on a human reply
//! channel or, when none is available, returns [`ClarificationRequest::format_unattended`]
//! as ordinary tool output.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::ToolResult;

pub const CLARIFICATION_TOOL_NAME: &str = "request_human_clarification";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}

/// Question the LLM wants a human to answer before it continues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub clarification_needed: bool,
    pub question: String,
    #[serde(default)]
    pub context_summary: String,
    /// Model's confidence in its current best guess, 0.0 to 1.0.
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_options: Vec<String>,
}

impl ClarificationRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            clarification_needed: true,
            question: question.into(),
            context_summary: String::new(),
            confidence: 0.5,
            urgency: Urgency::default(),
            suggested_options: Vec::new(),
        }
    }

    /// Payload for `ToolResult.data`.
    pub fn to_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Question as shown to the human operator.
    pub fn format_question(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "The agent needs clarification (urgency: {}, confidence: {:.0}%)",
            self.urgency.as_str(),
            self.confidence.clamp(0.0, 1.0) * 100.0
        );
        if !self.context_summary.trim().is_empty() {
            let _ = writeln!(out, "Context: {}", self.context_summary.trim());
        }
        let _ = writeln!(out, "Question: {}", self.question.trim());
        if !self.suggested_options.is_empty() {
            out.push_str("Options:\n");
            for (idx, option) in self.suggested_options.iter().enumerate() {
                let _ = writeln!(out, "  {}. {}", idx + 1, option);
            }
        }
        out
    }

    /// Tool output used when no human channel is available.
    pub fn format_unattended(&self) -> String {
        format!(
            "{}\nNo human operator is available in this run. Proceed with your best judgment and state the assumption you made.",
            self.format_question()
        )
    }
}

/// Extract a clarification request from a successful tool result.
pub fn detect(result: &ToolResult) -> Option<ClarificationRequest> {
    if !result.success {
        return None;
    }
    let data = result.data.as_ref()?;
    let marked = data
        .get("clarification_needed")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !marked {
        return None;
    }
    serde_json::from_value(data.clone()).ok()
}

/// User message appended after the human replies.
pub fn reply_message(reply: &str) -> String {
    format!("Clarification from the user: {}", reply.trim())
}
