//! Autonomous coding-agent loop CLI.
//!
//! `codeloop replay` runs the full agent loop against a scripted LLM, so runs
//! are reproducible without network access.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use codeloop::agents::{plan_role, tool_deps};
use codeloop::core::normalize::normalize_text;
use codeloop::core::types::{AgentResult, WorkflowRole};
use codeloop::exit_codes;
use codeloop::io::config::{AgentConfig, load_config, write_config};
use codeloop::io::human::ConsoleChannel;
use codeloop::io::process::ProcessRunner;
use codeloop::io::transcript::write_transcript;
use codeloop::io::workspace::Workspace;
use codeloop::llm::scripted::ScriptedLlm;
use codeloop::logging;

const DEFAULT_CONFIG_PATH: &str = ".codeloop/config.toml";

#[derive(Parser)]
#[command(name = "codeloop", version, about = "Autonomous coding-agent loop")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config file if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Print the tool definitions a role's LLM sees, as JSON.
    Tools {
        #[arg(long, value_enum)]
        role: RoleArg,
        #[arg(long, default_value = ".")]
        workspace: PathBuf,
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Normalize raw LLM text from stdin and print the response as JSON.
    Normalize,
    /// Run the agent loop with responses replayed from a script file.
    Replay {
        #[arg(long, value_enum)]
        role: RoleArg,
        /// JSON script of LLM turns.
        #[arg(long)]
        script: PathBuf,
        #[arg(long, default_value = ".")]
        workspace: PathBuf,
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Write the run's transcript as JSON.
        #[arg(long)]
        transcript: Option<PathBuf>,
        /// Answer clarification requests on the console.
        #[arg(long)]
        interactive: bool,
        /// The user request.
        request: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RoleArg {
    Planning,
    Generation,
    Review,
}

impl From<RoleArg> for WorkflowRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Planning => WorkflowRole::Planning,
            RoleArg::Generation => WorkflowRole::Generation,
            RoleArg::Review => WorkflowRole::Review,
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force, config } => cmd_init(&config, force),
        Command::Tools {
            role,
            workspace,
            config,
        } => cmd_tools(role.into(), &workspace, &config),
        Command::Normalize => cmd_normalize(),
        Command::Replay {
            role,
            script,
            workspace,
            config,
            transcript,
            interactive,
            request,
        } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("build tokio runtime")?;
            runtime.block_on(cmd_replay(ReplayArgs {
                role: role.into(),
                script,
                workspace,
                config,
                transcript,
                interactive,
                request,
            }))
        }
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if !force && config_path.exists() {
        println!("{} already exists (use --force to overwrite)", config_path.display());
        return Ok(exit_codes::OK);
    }
    write_config(config_path, &AgentConfig::default())?;
    println!("wrote {}", config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_tools(role: WorkflowRole, workspace: &Path, config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    let workspace = Workspace::local(workspace)?;
    let deps = tool_deps(&config, role, workspace, Arc::new(ProcessRunner));
    let plan = plan_role(&config, role, &deps)?;
    let payload = serde_json::to_string_pretty(&plan.registry.definitions())
        .context("serialize tool definitions")?;
    println!("{payload}");
    Ok(exit_codes::OK)
}

fn cmd_normalize() -> Result<i32> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("read llm output from stdin")?;
    let response = normalize_text(&raw);
    let payload = serde_json::to_string_pretty(&response).context("serialize response")?;
    println!("{payload}");
    Ok(exit_codes::OK)
}

struct ReplayArgs {
    role: WorkflowRole,
    script: PathBuf,
    workspace: PathBuf,
    config: PathBuf,
    transcript: Option<PathBuf>,
    interactive: bool,
    request: String,
}

async fn cmd_replay(args: ReplayArgs) -> Result<i32> {
    if args.request.trim().is_empty() {
        bail!("request must be non-empty");
    }
    let config = load_config(&args.config)?;
    let workspace = Workspace::local(&args.workspace)?;
    let llm = Arc::new(ScriptedLlm::load(&args.script)?);
    let deps = tool_deps(&config, args.role, workspace, Arc::new(ProcessRunner));
    let mut runner = plan_role(&config, args.role, &deps)?.into_runner(llm);
    if args.interactive {
        runner = runner.with_human(Arc::new(ConsoleChannel));
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling run");
            ctrl_c.cancel();
        }
    });

    info!(role = args.role.as_str(), "starting replay");
    let result = runner.run(&cancel, &args.request).await;
    report(&result);
    if let Some(path) = &args.transcript {
        write_transcript(path, &result)?;
    }
    Ok(exit_codes::for_status(result.status))
}

fn report(result: &AgentResult) {
    if let Some(text) = &result.final_response {
        println!("{text}");
    }
    if let Some(error) = &result.error {
        eprintln!("error: {error}");
    }
    eprintln!(
        "status={} iterations={} tool_calls={}",
        result.status.as_str(),
        result.iterations,
        result.tool_calls
    );
}
