//! `run_tests` and `run_lint`: configured commands run in the workspace root.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::core::errors::StandardizedToolError;
use crate::core::types::ToolResult;
use crate::io::process::{CommandOutput, CommandRequest, CommandRunner};
use crate::io::workspace::Workspace;
use crate::tools::{Tool, parse_params};

pub const RUN_TESTS: &str = "run_tests";
pub const RUN_LINT: &str = "run_lint";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Tests,
    Lint,
}

impl CommandKind {
    fn tool_name(self) -> &'static str {
        match self {
            CommandKind::Tests => RUN_TESTS,
            CommandKind::Lint => RUN_LINT,
        }
    }

    fn label(self) -> &'static str {
        match self {
            CommandKind::Tests => "tests",
            CommandKind::Lint => "lint",
        }
    }

    fn failure(self, output: &CommandOutput, text: &str) -> StandardizedToolError {
        match self {
            CommandKind::Tests => StandardizedToolError::tests_failed(output.exit_code, text),
            CommandKind::Lint => StandardizedToolError::lint_failed(output.exit_code, text),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Params {
    /// Extra arguments appended to the configured command.
    #[serde(default)]
    args: Vec<String>,
}

/// Runs a configured argv through the injected [`CommandRunner`].
#[derive(Clone)]
pub struct CommandTool {
    kind: CommandKind,
    argv: Vec<String>,
    workspace: Workspace,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl std::fmt::Debug for CommandTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTool")
            .field("kind", &self.kind)
            .field("argv", &self.argv)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl CommandTool {
    pub fn new(
        kind: CommandKind,
        argv: Vec<String>,
        workspace: Workspace,
        runner: Arc<dyn CommandRunner>,
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Self {
        Self {
            kind,
            argv,
            workspace,
            runner,
            timeout,
            output_limit_bytes,
        }
    }

    fn request(&self, extra: Vec<String>) -> Option<CommandRequest> {
        let mut argv = self.argv.clone();
        argv.extend(extra);
        CommandRequest::from_argv(
            &argv,
            self.workspace.root().to_path_buf(),
            self.timeout,
            self.output_limit_bytes,
        )
    }
}

#[async_trait]
impl Tool for CommandTool {
    fn name(&self) -> &str {
        self.kind.tool_name()
    }

    fn description(&self) -> &str {
        match self.kind {
            CommandKind::Tests => {
                "Run the project's configured test command in the workspace root.
Pass `args` to append extra arguments, such as a test name filter.
On failure the result includes the test output; fix the code and run again.
Example: {\"args\": [\"parser\"]}"
            }
            CommandKind::Lint => {
                "Run the project's configured lint command in the workspace root.
On failure the result includes the findings. Example: {}"
            }
        }
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "args": {"type": "array", "items": {"type": "string"}}
            },
            "additionalProperties": false
        })
    }

    #[instrument(skip_all, fields(tool = self.kind.tool_name()))]
    async fn execute(&self, cancel: &CancellationToken, params: Value) -> Result<ToolResult> {
        let params: Params = match parse_params(self.name(), params) {
            Ok(params) => params,
            Err(err) => return Ok(ToolResult::from_error(err)),
        };
        let request = self
            .request(params.args)
            .ok_or_else(|| anyhow!("{} command is empty", self.kind.label()))?;
        let shown = request.display();
        info!(command = %shown, "running command");

        // The blocking job owns the child; it kills it once `token` fires, so
        // wait for it rather than racing the token here.
        let runner = Arc::clone(&self.runner);
        let blocking_request = request.clone();
        let token = cancel.clone();
        let outcome = tokio::task::spawn_blocking(move || runner.run(&blocking_request, &token))
            .await
            .context("command runner task")?;

        let output = match outcome {
            Ok(output) => output,
            Err(err) => {
                if let Some(io_err) = err.downcast_ref::<io::Error>()
                    && matches!(
                        io_err.kind(),
                        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
                    )
                {
                    return Ok(ToolResult::from_error(
                        StandardizedToolError::command_not_found(&shown, io_err.to_string()),
                    ));
                }
                return Err(err.context(format!("run `{shown}`")));
            }
        };

        if output.cancelled {
            return Err(anyhow!("cancelled while running `{shown}`"));
        }
        if output.timed_out {
            return Ok(ToolResult::from_error(
                StandardizedToolError::command_timeout(&shown, request.timeout),
            ));
        }
        let text = output.combined_text(self.kind.label());
        if !output.success {
            return Ok(ToolResult::from_error(self.kind.failure(&output, &text)));
        }
        Ok(ToolResult::ok(Value::String(format!(
            "`{shown}` passed\n{text}"
        ))))
    }
}
