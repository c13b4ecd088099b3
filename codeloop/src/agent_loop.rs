//! The agent runner: an iteration state machine binding LLM decisions to tool
//! execution.
//!
//! ```text
//! INIT -> { AWAIT_LLM -> NORMALIZE -> DISPATCH -> AWAIT_TOOL -> APPEND }*
//!      -> SUCCESS | MAX_ITERATIONS | ERROR | CANCELLED
//! ```
//!
//! A run is strictly sequential. Every assistant message carrying a function
//! call is followed by exactly one tool message before the next LLM call. The
//! full message history is returned on every terminal path.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::budget::{IterationBudget, remaining_budget};
use crate::core::clarification::{self, ClarificationRequest};
use crate::core::conversation::render_prompt;
use crate::core::normalize::{RawLlmOutput, normalize};
use crate::core::types::{
    AgentResult, FunctionCall, FunctionCallResponse, Message, TerminalStatus, ToolDefinition,
};
use crate::io::config::RolePreset;
use crate::io::human::HumanChannel;
use crate::llm::{GenerateRequest, LlmClient, LlmError};
use crate::step::{DispatchOutcome, dispatch};
use crate::tools::registry::ToolRegistry;

/// Per-run limits and behaviour. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub model: String,
    pub max_iterations: u32,
    pub tool_timeout: Duration,
    /// Whether clarification requests suspend on the human channel.
    pub clarification_enabled: bool,
    /// Wall-clock bound for the whole run.
    pub run_timeout: Option<Duration>,
}

impl RunConfig {
    pub fn from_preset(model: impl Into<String>, preset: &RolePreset) -> Self {
        Self {
            model: model.into(),
            max_iterations: preset.max_iterations,
            tool_timeout: Duration::from_secs(preset.tool_timeout_secs),
            clarification_enabled: preset.clarification_enabled,
            run_timeout: preset.run_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Why a suspension point gave up early.
enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

/// Mutable state owned by one run.
struct RunState {
    messages: Vec<Message>,
    budget: IterationBudget,
    tool_calls: u32,
    last_assistant_text: Option<String>,
    deadline: Option<Instant>,
}

impl RunState {
    fn finish(
        self,
        status: TerminalStatus,
        final_response: Option<String>,
        error: Option<String>,
    ) -> AgentResult {
        info!(
            status = status.as_str(),
            iterations = self.budget.used(),
            tool_calls = self.tool_calls,
            "run finished"
        );
        AgentResult {
            status,
            success: status == TerminalStatus::Success,
            iterations: self.budget.used(),
            tool_calls: self.tool_calls,
            final_response,
            error,
            messages: self.messages,
        }
    }

    fn interrupted(self, interrupt: Interrupt) -> AgentResult {
        match interrupt {
            Interrupt::Cancelled => {
                self.finish(TerminalStatus::Cancelled, None, Some("run cancelled".to_string()))
            }
            Interrupt::DeadlineExceeded => self.finish(
                TerminalStatus::Error,
                None,
                Some("run deadline exceeded".to_string()),
            ),
        }
    }

    /// Await `fut` unless the run is cancelled or its deadline passes first.
    async fn bounded<F: Future>(
        &self,
        cancel: &CancellationToken,
        fut: F,
    ) -> Result<F::Output, Interrupt> {
        let Some(deadline) = self.deadline else {
            return tokio::select! {
                biased;
                () = cancel.cancelled() => Err(Interrupt::Cancelled),
                out = fut => Ok(out),
            };
        };
        let remaining = remaining_budget(deadline).map_err(|_| Interrupt::DeadlineExceeded)?;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Interrupt::Cancelled),
            out = tokio::time::timeout(remaining, fut) => out.map_err(|_| Interrupt::DeadlineExceeded),
        }
    }
}

/// Drives one role's conversation with an injected LLM client and registry.
///
/// The runner holds only shared, read-only collaborators, so one instance may
/// serve any number of concurrent runs.
#[derive(Clone)]
pub struct AgentRunner {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    config: RunConfig,
    system_prompt: String,
    human: Option<Arc<dyn HumanChannel>>,
}

impl std::fmt::Debug for AgentRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRunner")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("has_human", &self.human.is_some())
            .finish_non_exhaustive()
    }
}

impl AgentRunner {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        config: RunConfig,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            registry,
            config,
            system_prompt: system_prompt.into(),
            human: None,
        }
    }

    /// Attach a reply channel so clarification requests can suspend the run.
    pub fn with_human(mut self, human: Arc<dyn HumanChannel>) -> Self {
        self.human = Some(human);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run the loop for `request` until a terminal status.
    #[instrument(skip_all, fields(model = %self.config.model, max_iterations = self.config.max_iterations))]
    pub async fn run(&self, cancel: &CancellationToken, request: &str) -> AgentResult {
        let mut state = RunState {
            messages: vec![
                Message::system(self.system_prompt.clone()),
                Message::user(request),
            ],
            budget: IterationBudget::new(self.config.max_iterations),
            tool_calls: 0,
            last_assistant_text: None,
            deadline: self.config.run_timeout.map(|timeout| Instant::now() + timeout),
        };
        let tools = self.registry.definitions();

        while state.budget.has_remaining() {
            if cancel.is_cancelled() {
                return state.interrupted(Interrupt::Cancelled);
            }
            let iteration = state.budget.used() + 1;
            debug!(iteration, "requesting llm decision");

            let llm_request = self.llm_request(&state.messages, &tools);
            let response = match state
                .bounded(cancel, self.llm.generate_with_functions(&llm_request))
                .await
            {
                Ok(response) => response,
                Err(interrupt) => return state.interrupted(interrupt),
            };

            // Transport failures end the run without spending an iteration.
            let response = match response {
                Ok(response) => response,
                Err(LlmError::Cancelled) => return state.interrupted(Interrupt::Cancelled),
                Err(err) => {
                    warn!(iteration, err = %err, "llm request failed");
                    let message = err.to_string();
                    return state.finish(TerminalStatus::Error, None, Some(message));
                }
            };
            state.budget.consume();

            let (prose, decision) = self.normalize_response(response);
            let call = match decision {
                FunctionCallResponse::Text(text) => {
                    state.messages.push(Message::assistant_text(text.clone()));
                    return state.finish(TerminalStatus::Success, Some(text), None);
                }
                FunctionCallResponse::FunctionCall(call) => call,
            };

            state.tool_calls += 1;
            let call = with_call_id(call, state.tool_calls);
            if !prose.trim().is_empty() {
                state.last_assistant_text = Some(prose.clone());
            }
            state
                .messages
                .push(Message::assistant_call(prose, call.clone()));
            debug!(iteration, tool = %call.name, "dispatching tool call");

            let timeout = match state.deadline {
                Some(deadline) => match remaining_budget(deadline) {
                    Ok(remaining) => remaining.min(self.config.tool_timeout),
                    Err(_) => {
                        state.messages.push(Message::tool(
                            &call,
                            "Error: run deadline exceeded before the tool ran",
                        ));
                        return state.interrupted(Interrupt::DeadlineExceeded);
                    }
                },
                None => self.config.tool_timeout,
            };

            let result = match dispatch(&self.registry, &call, timeout, cancel).await {
                DispatchOutcome::Completed(result) => result,
                DispatchOutcome::Cancelled => {
                    state.messages.push(Message::tool(
                        &call,
                        "Error: run cancelled before the tool finished",
                    ));
                    return state.interrupted(Interrupt::Cancelled);
                }
            };

            let Some(question) = clarification::detect(&result) else {
                state
                    .messages
                    .push(Message::tool(&call, result.render_for_llm()));
                continue;
            };
            if let Err(interrupt) = self.clarify(&mut state, cancel, &call, &question).await {
                return state.interrupted(interrupt);
            }
        }

        let max = state.budget.max();
        let final_response = state.last_assistant_text.clone();
        state.finish(
            TerminalStatus::MaxIterations,
            final_response,
            Some(format!(
                "reached maximum iterations ({max}) without a final response"
            )),
        )
    }

    fn llm_request(&self, messages: &[Message], tools: &[ToolDefinition]) -> GenerateRequest {
        GenerateRequest {
            model: self.config.model.clone(),
            prompt: render_prompt(messages),
            system_prompt: self.system_prompt.clone(),
            tools: tools.to_vec(),
        }
    }

    /// Split a response into assistant prose and the normalized decision.
    ///
    /// Clients without native function calling return raw text that may embed
    /// a call; that text is kept verbatim as the assistant message content.
    fn normalize_response(&self, response: FunctionCallResponse) -> (String, FunctionCallResponse) {
        match response {
            FunctionCallResponse::Text(text) if !self.llm.supports_native_function_calling() => {
                let decision = normalize(RawLlmOutput::Text(text.clone()));
                (text, decision)
            }
            native => (String::new(), normalize(RawLlmOutput::Native(native))),
        }
    }

    /// Suspend for a human reply, or degrade to plain tool output when no
    /// channel is available. Does not consume iteration budget.
    async fn clarify(
        &self,
        state: &mut RunState,
        cancel: &CancellationToken,
        call: &FunctionCall,
        request: &ClarificationRequest,
    ) -> Result<(), Interrupt> {
        let human = match &self.human {
            Some(human) if self.config.clarification_enabled => human,
            _ => {
                debug!("no human channel; returning clarification as tool output");
                state
                    .messages
                    .push(Message::tool(call, request.format_unattended()));
                return Ok(());
            }
        };

        let question = request.format_question();
        info!(urgency = request.urgency.as_str(), "suspending for clarification");
        let reply = match state.bounded(cancel, human.ask(&question)).await {
            Ok(reply) => reply,
            Err(interrupt) => {
                state.messages.push(Message::tool(call, question));
                return Err(interrupt);
            }
        };

        match reply {
            Ok(reply) => {
                state.messages.push(Message::tool(call, question));
                state
                    .messages
                    .push(Message::user(clarification::reply_message(&reply)));
                info!("clarification received; resuming");
            }
            Err(err) => {
                warn!(err = format!("{err:#}"), "human channel failed; continuing unattended");
                state
                    .messages
                    .push(Message::tool(call, request.format_unattended()));
            }
        }
        Ok(())
    }
}

/// Assign a stable id so tool messages pair with their call.
fn with_call_id(call: FunctionCall, ordinal: u32) -> FunctionCall {
    if call.id.as_deref().is_some_and(|id| !id.is_empty()) {
        call
    } else {
        call.with_id(format!("call-{ordinal}"))
    }
}
