//! Tool contract, registry, and the built-in tools the role presets use.
//!
//! Tools are shared across concurrent runs through `Arc<dyn Tool>`, so they
//! hold no per-call mutable state.

pub mod clarification;
pub mod command;
pub mod factory;
pub mod fs;
pub mod registry;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::errors::StandardizedToolError;
use crate::core::types::{ToolDefinition, ToolResult};

/// A named capability the LLM can invoke.
///
/// Domain failures (missing file, bad range, disallowed path) are returned as a
/// failed [`ToolResult`] carrying a [`StandardizedToolError`]. The `Err` return
/// is reserved for internal faults; the runner wraps those as `INTERNAL_ERROR`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry key and LLM-facing function name.
    fn name(&self) -> &str;

    /// Usage guidance shown to the LLM.
    fn description(&self) -> &str;

    /// JSON Schema (`type: object`) for the arguments.
    fn parameter_schema(&self) -> Value;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameter_schema(),
        }
    }

    /// Run with arguments already validated against [`Tool::parameter_schema`].
    async fn execute(&self, cancel: &CancellationToken, params: Value) -> Result<ToolResult>;
}

/// Deserialize validated arguments into a typed parameter struct.
pub(crate) fn parse_params<T: DeserializeOwned>(
    tool: &str,
    params: Value,
) -> Result<T, StandardizedToolError> {
    serde_json::from_value(params)
        .map_err(|err| StandardizedToolError::invalid_parameter(tool, "arguments", err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorCode;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Params {
        path: String,
        #[serde(default)]
        limit: Option<u32>,
    }

    #[test]
    fn parse_params_reads_typed_fields() {
        let params: Params =
            parse_params("read_file", json!({"path": "a.txt", "limit": 3})).expect("parse");
        assert_eq!(params.path, "a.txt");
        assert_eq!(params.limit, Some(3));
    }

    #[test]
    fn parse_params_reports_invalid_parameter() {
        let err = parse_params::<Params>("read_file", json!({"path": 7})).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
    }
}
