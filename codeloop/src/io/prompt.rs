//! Role-specific system prompt rendering.
//!
//! Templates live in `prompts/` and mark each section with
//! `<!-- section:KEY required|droppable -->`. When the rendered prompt exceeds
//! the byte budget, droppable sections are removed first.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::core::types::{ToolDefinition, WorkflowRole};

const PLANNING_TEMPLATE: &str = include_str!("prompts/planning.md");
const GENERATION_TEMPLATE: &str = include_str!("prompts/generation.md");
const REVIEW_TEMPLATE: &str = include_str!("prompts/review.md");

pub const DEFAULT_PROMPT_BUDGET_BYTES: usize = 16_000;

static SECTION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->")
        .unwrap_or_else(|err| panic!("section marker regex: {err}"))
});

/// One tool as listed in the system prompt.
#[derive(Debug, Clone, Serialize)]
struct ToolSummary {
    name: String,
    /// First line of the tool's description.
    summary: String,
}

/// Inputs for rendering a system prompt.
#[derive(Debug, Clone)]
pub struct PromptInputs {
    pub role: WorkflowRole,
    pub workspace_root: String,
    pub tools: Vec<ToolDefinition>,
    pub clarification_enabled: bool,
}

#[derive(Debug, Clone)]
struct ParsedSection {
    key: String,
    required: bool,
    content: String,
}

/// Builds system prompts within a byte budget.
#[derive(Debug, Clone)]
pub struct SystemPromptBuilder {
    budget_bytes: usize,
}

impl Default for SystemPromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_BUDGET_BYTES)
    }
}

impl SystemPromptBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    pub fn build(&self, inputs: &PromptInputs) -> Result<String> {
        let rendered = render_template(inputs)?;
        let mut sections = parse_sections(&rendered);
        apply_budget_to_sections(&mut sections, self.budget_bytes);
        Ok(sections
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

fn render_template(inputs: &PromptInputs) -> Result<String> {
    let (name, source) = match inputs.role {
        WorkflowRole::Planning => ("planning", PLANNING_TEMPLATE),
        WorkflowRole::Generation => ("generation", GENERATION_TEMPLATE),
        WorkflowRole::Review => ("review", REVIEW_TEMPLATE),
    };
    let mut env = Environment::new();
    env.add_template(name, source)
        .with_context(|| format!("parse {name} prompt template"))?;
    let tools: Vec<ToolSummary> = inputs
        .tools
        .iter()
        .map(|tool| ToolSummary {
            name: tool.name.clone(),
            summary: tool.description.lines().next().unwrap_or_default().to_string(),
        })
        .collect();
    let rendered = env.get_template(name)?.render(context! {
        workspace_root => inputs.workspace_root.as_str(),
        tools => tools,
        clarification_enabled => inputs.clarification_enabled,
    })?;
    Ok(rendered)
}

fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    let matches: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    let mut sections = Vec::new();

    for (i, caps) in matches.iter().enumerate() {
        let (Some(marker), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |m| m.start());
        let content = rendered[marker.end()..end].trim().to_string();
        let required = kind.as_str() == "required";
        if !content.is_empty() || required {
            sections.push(ParsedSection {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }

    sections
}

/// Drop order: tools -> clarification.
fn apply_budget_to_sections(sections: &mut Vec<ParsedSection>, budget: usize) {
    let total_len =
        |secs: &[ParsedSection]| -> usize { secs.iter().map(|s| s.content.len()).sum() };

    for key in ["tools", "clarification"] {
        if total_len(sections) <= budget {
            return;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropped system prompt section for budget"
            );
            sections.remove(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs(role: WorkflowRole, clarification_enabled: bool) -> PromptInputs {
        PromptInputs {
            role,
            workspace_root: "/work/repo".to_string(),
            tools: vec![ToolDefinition {
                name: "read_file".to_string(),
                description: "Read a text file.\nMore detail here.".to_string(),
                parameters: json!({"type": "object"}),
            }],
            clarification_enabled,
        }
    }

    #[test]
    fn each_role_has_its_own_contract() {
        let builder = SystemPromptBuilder::default();
        for (role, heading) in [
            (WorkflowRole::Planning, "### Planning Contract"),
            (WorkflowRole::Generation, "### Generation Contract"),
            (WorkflowRole::Review, "### Review Contract"),
        ] {
            let prompt = builder.build(&inputs(role, true)).expect("render");
            assert!(prompt.starts_with(heading), "{role:?}");
            assert!(prompt.contains("/work/repo"));
            assert!(prompt.contains("- `read_file`: Read a text file."));
            assert!(!prompt.contains("More detail here."));
            assert!(!prompt.contains("<!--"));
        }
    }

    #[test]
    fn clarification_section_follows_config() {
        let builder = SystemPromptBuilder::default();
        let with = builder
            .build(&inputs(WorkflowRole::Generation, true))
            .expect("render");
        let without = builder
            .build(&inputs(WorkflowRole::Generation, false))
            .expect("render");
        assert!(with.contains("request_human_clarification"));
        assert!(!without.contains("request_human_clarification"));
    }

    #[test]
    fn budget_drops_tool_listing_before_required_sections() {
        let prompt = SystemPromptBuilder::new(200)
            .build(&inputs(WorkflowRole::Generation, true))
            .expect("render");
        assert!(!prompt.contains("### Tools"));
        assert!(!prompt.contains("### Clarification"));
        assert!(prompt.contains("### Generation Contract"));
        assert!(prompt.contains("### Workspace"));
    }
}
