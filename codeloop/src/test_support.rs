//! Test-only fakes: tools with fixed behaviour, a stalling LLM, and temp
//! workspaces.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::core::types::{FunctionCallResponse, ToolResult};
use crate::io::workspace::Workspace;
use crate::llm::{GenerateRequest, LlmClient, LlmError, TextStream};
use crate::tools::Tool;

/// Temp directory plus a local [`Workspace`] rooted at it.
pub fn temp_workspace() -> (TempDir, Workspace) {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = Workspace::local(temp.path()).expect("workspace");
    (temp, workspace)
}

/// Always fails with a bare error string (no standardized error).
#[derive(Debug, Clone)]
pub struct FailingTool {
    name: String,
    error: String,
}

impl FailingTool {
    pub fn new(name: &str, error: &str) -> Self {
        Self {
            name: name.to_string(),
            error: error.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails."
    }

    fn parameter_schema(&self) -> Value {
        json!({"type": "object", "properties": {"path": {"type": "string"}}})
    }

    async fn execute(&self, _cancel: &CancellationToken, _params: Value) -> Result<ToolResult> {
        Ok(ToolResult::failure(self.error.clone()))
    }
}

/// Panics with the `reason` argument.
#[derive(Debug, Clone)]
pub struct PanickingTool {
    name: String,
}

impl PanickingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Panics."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"reason": {"type": "string"}},
            "required": ["reason"]
        })
    }

    async fn execute(&self, _cancel: &CancellationToken, params: Value) -> Result<ToolResult> {
        let reason = params["reason"].as_str().unwrap_or("unspecified").to_string();
        panic!("{reason}");
    }
}

/// Sleeps for a fixed duration before succeeding.
#[derive(Debug, Clone)]
pub struct SlowTool {
    name: String,
    delay: Duration,
}

impl SlowTool {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Sleeps, then succeeds."
    }

    fn parameter_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _cancel: &CancellationToken, _params: Value) -> Result<ToolResult> {
        tokio::time::sleep(self.delay).await;
        Ok(ToolResult::ok(json!("finished")))
    }
}

/// Echoes its `value` argument back after yielding, so concurrent calls
/// interleave.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Returns `value` unchanged."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"value": {"type": "string"}},
            "required": ["value"]
        })
    }

    async fn execute(&self, _cancel: &CancellationToken, params: Value) -> Result<ToolResult> {
        tokio::task::yield_now().await;
        Ok(ToolResult::ok(params["value"].clone()))
    }
}

/// LLM client whose calls never complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct StallingLlm;

#[async_trait]
impl LlmClient for StallingLlm {
    async fn generate(&self, _request: &GenerateRequest) -> Result<String, LlmError> {
        std::future::pending().await
    }

    async fn generate_with_functions(
        &self,
        _request: &GenerateRequest,
    ) -> Result<FunctionCallResponse, LlmError> {
        std::future::pending().await
    }

    async fn stream(&self, _request: &GenerateRequest) -> Result<TextStream, LlmError> {
        std::future::pending().await
    }

    async fn list_available_models(&self) -> Result<Vec<String>, LlmError> {
        Ok(Vec::new())
    }

    fn supports_native_function_calling(&self) -> bool {
        true
    }
}
