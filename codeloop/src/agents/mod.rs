//! Workflow role presets: planning, generation, review.
//!
//! A preset is just a registry, a [`RunConfig`], and a system prompt. The loop
//! never branches on role.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::agent_loop::{AgentRunner, RunConfig};
use crate::core::types::WorkflowRole;
use crate::io::config::AgentConfig;
use crate::io::process::CommandRunner;
use crate::io::prompt::{PromptInputs, SystemPromptBuilder};
use crate::io::workspace::Workspace;
use crate::llm::LlmClient;
use crate::tools::factory::{ToolDeps, registry_for};
use crate::tools::registry::ToolRegistry;

/// Fully resolved configuration for one role.
#[derive(Debug, Clone)]
pub struct RolePlan {
    pub role: WorkflowRole,
    pub registry: Arc<ToolRegistry>,
    pub run_config: RunConfig,
    pub system_prompt: String,
}

impl RolePlan {
    pub fn into_runner(self, llm: Arc<dyn LlmClient>) -> AgentRunner {
        AgentRunner::new(llm, self.registry, self.run_config, self.system_prompt)
    }
}

/// Tool dependencies for `role`. Subprocesses get the role's tool timeout.
pub fn tool_deps(
    config: &AgentConfig,
    role: WorkflowRole,
    workspace: Workspace,
    runner: Arc<dyn CommandRunner>,
) -> ToolDeps {
    ToolDeps {
        workspace,
        runner,
        commands: config.commands.clone(),
        limits: config.limits,
        command_timeout: Duration::from_secs(config.preset(role).tool_timeout_secs),
    }
}

/// Build the registry, run config, and system prompt for `role`.
pub fn plan_role(config: &AgentConfig, role: WorkflowRole, deps: &ToolDeps) -> Result<RolePlan> {
    let registry = registry_for(role, deps)
        .with_context(|| format!("build {} tool registry", role.as_str()))?;
    let run_config = RunConfig::from_preset(config.model.clone(), config.preset(role));
    let system_prompt = SystemPromptBuilder::default()
        .build(&PromptInputs {
            role,
            workspace_root: deps.workspace.root().display().to_string(),
            tools: registry.definitions(),
            clarification_enabled: run_config.clarification_enabled,
        })
        .with_context(|| format!("render {} system prompt", role.as_str()))?;

    Ok(RolePlan {
        role,
        registry: Arc::new(registry),
        run_config,
        system_prompt,
    })
}
