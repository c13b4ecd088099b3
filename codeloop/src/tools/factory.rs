//! Per-role registry factories.
//!
//! Capability restriction happens here: a role can only call what its factory
//! registers. Dependencies are passed in explicitly so tests can substitute a
//! fake filesystem or command runner.

use std::sync::Arc;
use std::time::Duration;

use crate::core::types::WorkflowRole;
use crate::io::config::{CommandsConfig, ToolLimits};
use crate::io::process::CommandRunner;
use crate::io::workspace::Workspace;
use crate::tools::clarification::ClarificationTool;
use crate::tools::command::{CommandKind, CommandTool};
use crate::tools::fs::{ListDirectoryTool, ReadFileTool, SearchFilesTool, WriteFileTool};
use crate::tools::registry::{RegistryError, ToolRegistry};

/// Everything the built-in tools need.
#[derive(Clone)]
pub struct ToolDeps {
    pub workspace: Workspace,
    pub runner: Arc<dyn CommandRunner>,
    pub commands: CommandsConfig,
    pub limits: ToolLimits,
    /// Subprocess timeout for `run_tests` / `run_lint`.
    pub command_timeout: Duration,
}

impl std::fmt::Debug for ToolDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDeps")
            .field("workspace", &self.workspace)
            .field("commands", &self.commands)
            .field("limits", &self.limits)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl ToolDeps {
    fn command_tool(&self, kind: CommandKind) -> CommandTool {
        let argv = match kind {
            CommandKind::Tests => self.commands.test.clone(),
            CommandKind::Lint => self.commands.lint.clone(),
        };
        CommandTool::new(
            kind,
            argv,
            self.workspace.clone(),
            Arc::clone(&self.runner),
            self.command_timeout,
            self.limits.command_output_limit_bytes,
        )
    }
}

/// Read-only inspection plus clarification. No write or shell tools.
pub fn planning_registry(deps: &ToolDeps) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    register_read_only(&mut registry, deps)?;
    registry.register(Arc::new(ClarificationTool))?;
    Ok(registry)
}

/// Planning tools plus `write_file` and `run_tests`.
pub fn generation_registry(deps: &ToolDeps) -> Result<ToolRegistry, RegistryError> {
    let mut registry = planning_registry(deps)?;
    registry.register(Arc::new(WriteFileTool::new(
        deps.workspace.clone(),
        deps.limits,
    )))?;
    registry.register(Arc::new(deps.command_tool(CommandKind::Tests)))?;
    Ok(registry)
}

/// Planning tools plus `run_tests` and `run_lint`. No write tools.
pub fn review_registry(deps: &ToolDeps) -> Result<ToolRegistry, RegistryError> {
    let mut registry = planning_registry(deps)?;
    registry.register(Arc::new(deps.command_tool(CommandKind::Tests)))?;
    registry.register(Arc::new(deps.command_tool(CommandKind::Lint)))?;
    Ok(registry)
}

pub fn registry_for(role: WorkflowRole, deps: &ToolDeps) -> Result<ToolRegistry, RegistryError> {
    match role {
        WorkflowRole::Planning => planning_registry(deps),
        WorkflowRole::Generation => generation_registry(deps),
        WorkflowRole::Review => review_registry(deps),
    }
}

fn register_read_only(registry: &mut ToolRegistry, deps: &ToolDeps) -> Result<(), RegistryError> {
    registry.register(Arc::new(ListDirectoryTool::new(
        deps.workspace.clone(),
        deps.limits,
    )))?;
    registry.register(Arc::new(ReadFileTool::new(
        deps.workspace.clone(),
        deps.limits,
    )))?;
    registry.register(Arc::new(SearchFilesTool::new(
        deps.workspace.clone(),
        deps.limits,
    )))?;
    Ok(())
}
