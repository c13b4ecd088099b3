//! Agent configuration stored as TOML (default `.codeloop/config.toml`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::WorkflowRole;

/// Agent configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values in
/// the `Default` impls below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Model identifier passed to the LLM client.
    pub model: String,

    #[serde(default = "RolePreset::planning")]
    pub planning: RolePreset,

    #[serde(default = "RolePreset::generation")]
    pub generation: RolePreset,

    #[serde(default = "RolePreset::review")]
    pub review: RolePreset,

    pub limits: ToolLimits,

    pub commands: CommandsConfig,
}

/// Budget and behaviour for one workflow role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RolePreset {
    /// Maximum LLM round-trips per run.
    pub max_iterations: u32,

    /// Wall-clock bound for a single tool execution.
    pub tool_timeout_secs: u64,

    /// Whether clarification requests suspend the run for a human reply.
    #[serde(default = "default_true")]
    pub clarification_enabled: bool,

    /// Optional wall-clock bound for the whole run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl RolePreset {
    pub fn planning() -> Self {
        Self {
            max_iterations: 10,
            tool_timeout_secs: 60,
            clarification_enabled: true,
            run_timeout_secs: None,
        }
    }

    pub fn generation() -> Self {
        Self {
            max_iterations: 25,
            tool_timeout_secs: 120,
            clarification_enabled: true,
            run_timeout_secs: None,
        }
    }

    pub fn review() -> Self {
        Self {
            max_iterations: 12,
            tool_timeout_secs: 600,
            clarification_enabled: true,
            run_timeout_secs: None,
        }
    }
}

/// Size bounds applied by the built-in tools.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolLimits {
    /// Largest file `read_file` returns or `write_file` accepts.
    pub max_file_bytes: u64,
    pub max_list_entries: usize,
    pub max_search_matches: usize,
    /// Truncate test/lint stdout/stderr beyond this many bytes.
    pub command_output_limit_bytes: usize,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 1_000_000,
            max_list_entries: 500,
            max_search_matches: 200,
            command_output_limit_bytes: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandsConfig {
    /// Command for `run_tests` (e.g. `["cargo","test"]`).
    pub test: Vec<String>,
    /// Command for `run_lint`.
    pub lint: Vec<String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            test: vec!["cargo".to_string(), "test".to_string()],
            lint: vec![
                "cargo".to_string(),
                "clippy".to_string(),
                "--".to_string(),
                "-D".to_string(),
                "warnings".to_string(),
            ],
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            planning: RolePreset::planning(),
            generation: RolePreset::generation(),
            review: RolePreset::review(),
            limits: ToolLimits::default(),
            commands: CommandsConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn preset(&self, role: WorkflowRole) -> &RolePreset {
        match role {
            WorkflowRole::Planning => &self.planning,
            WorkflowRole::Generation => &self.generation,
            WorkflowRole::Review => &self.review,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must be non-empty"));
        }
        for role in WorkflowRole::ALL {
            let preset = self.preset(role);
            let name = role.as_str();
            if preset.max_iterations == 0 {
                return Err(anyhow!("{name}.max_iterations must be > 0"));
            }
            if preset.tool_timeout_secs == 0 {
                return Err(anyhow!("{name}.tool_timeout_secs must be > 0"));
            }
            if preset.run_timeout_secs == Some(0) {
                return Err(anyhow!("{name}.run_timeout_secs must be > 0 when set"));
            }
        }
        if self.limits.max_file_bytes == 0 {
            return Err(anyhow!("limits.max_file_bytes must be > 0"));
        }
        if self.limits.max_list_entries == 0 || self.limits.max_search_matches == 0 {
            return Err(anyhow!(
                "limits.max_list_entries and limits.max_search_matches must be > 0"
            ));
        }
        if self.limits.command_output_limit_bytes == 0 {
            return Err(anyhow!("limits.command_output_limit_bytes must be > 0"));
        }
        for (name, command) in [("test", &self.commands.test), ("lint", &self.commands.lint)] {
            if command.is_empty() || command[0].trim().is_empty() {
                return Err(anyhow!("commands.{name} must be a non-empty array"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
