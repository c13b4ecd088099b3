//! Dispatch of a single function call: lookup, validate, execute, wrap.
//!
//! Every path produces a [`ToolResult`] for the conversation except
//! cancellation, which the caller turns into a terminal status.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::core::errors::StandardizedToolError;
use crate::core::schema::validate_arguments;
use crate::core::types::{FunctionCall, ToolResult};
use crate::tools::registry::ToolRegistry;

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Completed(ToolResult),
    /// The run was cancelled before the tool finished. The tool task has been
    /// aborted.
    Cancelled,
}

/// Execute `call` against `registry`, bounded by `timeout` and `cancel`.
///
/// - Unknown names yield `UNSUPPORTED_OPERATION` listing the available tools.
/// - Arguments are validated against the tool schema before execution.
/// - The tool runs in its own task; a panic or an `Err` return becomes
///   `INTERNAL_ERROR`, and exceeding `timeout` becomes `TIMEOUT`.
#[instrument(skip_all, fields(tool = %call.name, timeout_ms = timeout.as_millis() as u64))]
pub async fn dispatch(
    registry: &ToolRegistry,
    call: &FunctionCall,
    timeout: Duration,
    cancel: &CancellationToken,
) -> DispatchOutcome {
    let Some(tool) = registry.get(&call.name) else {
        warn!("llm requested an unregistered tool");
        return DispatchOutcome::Completed(ToolResult::from_error(
            StandardizedToolError::unsupported_operation(&call.name, &registry.names()),
        ));
    };

    let arguments = match validate_arguments(&call.name, &tool.parameter_schema(), &call.arguments)
    {
        Ok(arguments) => arguments,
        Err(err) => {
            debug!(code = %err.code, "arguments rejected");
            return DispatchOutcome::Completed(ToolResult::from_error(err));
        }
    };

    // Blocking work inside a tool outlives `abort`; the token reaches it.
    let tool_cancel = cancel.child_token();
    let task_cancel = tool_cancel.clone();
    let task_tool = Arc::clone(&tool);
    let handle =
        tokio::spawn(async move { task_tool.execute(&task_cancel, arguments).await });
    let abort = handle.abort_handle();

    let joined = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            abort.abort();
            debug!("tool aborted by cancellation");
            return DispatchOutcome::Cancelled;
        }
        joined = tokio::time::timeout(timeout, handle) => joined,
    };

    let result = match joined {
        Err(_elapsed) => {
            tool_cancel.cancel();
            abort.abort();
            warn!("tool timed out");
            ToolResult::from_error(StandardizedToolError::timeout(&call.name, timeout))
        }
        Ok(Err(join_err)) if join_err.is_panic() => {
            let detail = panic_message(join_err.into_panic());
            warn!(panic = %detail, "tool panicked");
            ToolResult::from_error(StandardizedToolError::internal_error(
                &call.name,
                format!("tool panicked: {detail}"),
            ))
        }
        Ok(Err(join_err)) => ToolResult::from_error(StandardizedToolError::internal_error(
            &call.name,
            join_err.to_string(),
        )),
        Ok(Ok(Err(err))) => {
            warn!(err = format!("{err:#}"), "tool returned an internal error");
            ToolResult::from_error(StandardizedToolError::internal_error(
                &call.name,
                format!("{err:#}"),
            ))
        }
        Ok(Ok(Ok(result))) => result,
    };

    if cancel.is_cancelled() {
        return DispatchOutcome::Cancelled;
    }
    debug!(success = result.success, "tool finished");
    DispatchOutcome::Completed(result)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
