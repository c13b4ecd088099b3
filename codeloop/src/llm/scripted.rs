//! Deterministic LLM client that replays a fixed script of turns.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use super::{GenerateRequest, LlmClient, LlmError, TextStream};
use crate::core::types::{FunctionCall, FunctionCallResponse};

/// One scripted model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedTurn {
    /// Final text answer.
    Text(String),
    /// A tool call. Non-native scripts emit it as JSON text for normalization.
    FunctionCall(FunctionCall),
    /// Raw provider text, passed through as-is.
    Raw(String),
    /// Transport failure.
    Error(String),
}

/// On-disk script format for `codeloop replay`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    #[serde(default = "default_native")]
    pub native: bool,
    #[serde(default)]
    pub repeat_last: bool,
    pub turns: Vec<ScriptedTurn>,
}

fn default_native() -> bool {
    true
}

pub struct ScriptedLlm {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<GenerateRequest>>,
    native: bool,
    repeat_last: bool,
}

impl ScriptedLlm {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
            native: true,
            repeat_last: false,
        }
    }

    /// Client that answers every request with `turn`.
    pub fn repeating(turn: ScriptedTurn) -> Self {
        Self::new(vec![turn]).with_repeat_last(true)
    }

    /// Emulate a provider without native function calling.
    pub fn without_native_calls(mut self) -> Self {
        self.native = false;
        self
    }

    pub fn with_repeat_last(mut self, repeat_last: bool) -> Self {
        self.repeat_last = repeat_last;
        self
    }

    pub fn from_script(script: Script) -> Self {
        let mut client = Self::new(script.turns).with_repeat_last(script.repeat_last);
        client.native = script.native;
        client
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read script {}", path.display()))?;
        let script: Script = serde_json::from_str(&contents)
            .with_context(|| format!("parse script {}", path.display()))?;
        Ok(Self::from_script(script))
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| request.prompt)
            .collect()
    }

    fn next_turn(&self, request: &GenerateRequest) -> Result<ScriptedTurn, LlmError> {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        requests.push(request.clone());
        let served = requests.len() - 1;
        drop(requests);

        let mut turns = self.turns.lock().unwrap_or_else(PoisonError::into_inner);
        let turn = if self.repeat_last && turns.len() == 1 {
            turns.front().cloned()
        } else {
            turns.pop_front()
        };
        debug!(served, remaining = turns.len(), "scripted llm turn");
        turn.ok_or(LlmError::ScriptExhausted { served })
    }

    fn call_as_text(call: &FunctionCall) -> Result<String, LlmError> {
        Ok(serde_json::to_string(call)?)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        match self.next_turn(request)? {
            ScriptedTurn::Text(text) | ScriptedTurn::Raw(text) => Ok(text),
            ScriptedTurn::FunctionCall(call) => Self::call_as_text(&call),
            ScriptedTurn::Error(message) => Err(LlmError::Transport { message }),
        }
    }

    async fn generate_with_functions(
        &self,
        request: &GenerateRequest,
    ) -> Result<FunctionCallResponse, LlmError> {
        match self.next_turn(request)? {
            ScriptedTurn::Text(text) | ScriptedTurn::Raw(text) => {
                Ok(FunctionCallResponse::Text(text))
            }
            ScriptedTurn::FunctionCall(call) if self.native => {
                Ok(FunctionCallResponse::FunctionCall(call))
            }
            ScriptedTurn::FunctionCall(call) => {
                Ok(FunctionCallResponse::Text(Self::call_as_text(&call)?))
            }
            ScriptedTurn::Error(message) => Err(LlmError::Transport { message }),
        }
    }

    async fn stream(&self, request: &GenerateRequest) -> Result<TextStream, LlmError> {
        let text = self.generate(request).await?;
        let words: Vec<String> = text.split_inclusive(' ').map(str::to_string).collect();
        let (tx, rx) = mpsc::channel(words.len().max(1));
        for word in words {
            // Capacity covers every chunk, so this never waits.
            if tx.try_send(Ok(word)).is_err() {
                break;
            }
        }
        Ok(rx)
    }

    async fn list_available_models(&self) -> Result<Vec<String>, LlmError> {
        Ok(vec!["scripted".to_string()])
    }

    fn supports_native_function_calling(&self) -> bool {
        self.native
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            model: "scripted".to_string(),
            prompt: prompt.to_string(),
            system_prompt: String::new(),
            tools: Vec::new(),
        }
    }

    #[tokio::test]
    async fn replays_turns_in_order_then_exhausts() {
        let llm = ScriptedLlm::new(vec![
            ScriptedTurn::FunctionCall(FunctionCall::new("list_directory", json!({}))),
            ScriptedTurn::Text("done".to_string()),
        ]);

        let first = llm.generate_with_functions(&request("one")).await.expect("first");
        assert!(!first.is_text_response());
        let second = llm.generate_with_functions(&request("two")).await.expect("second");
        assert_eq!(second.text_content(), Some("done"));
        let err = llm.generate_with_functions(&request("three")).await.unwrap_err();
        assert!(matches!(err, LlmError::ScriptExhausted { served: 2 }));
        assert_eq!(llm.prompts(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn non_native_calls_arrive_as_json_text() {
        let llm = ScriptedLlm::new(vec![ScriptedTurn::FunctionCall(FunctionCall::new(
            "read_file",
            json!({"path": "a"}),
        ))])
        .without_native_calls();

        let response = llm.generate_with_functions(&request("p")).await.expect("response");
        let text = response.text_content().expect("text");
        assert!(text.contains("\"read_file\""));
        assert!(!llm.supports_native_function_calling());
    }

    #[tokio::test]
    async fn repeating_never_exhausts() {
        let llm = ScriptedLlm::repeating(ScriptedTurn::Text("again".to_string()));
        for _ in 0..5 {
            let text = llm.generate(&request("p")).await.expect("text");
            assert_eq!(text, "again");
        }
    }

    #[tokio::test]
    async fn stream_yields_whole_text() {
        let llm = ScriptedLlm::new(vec![ScriptedTurn::Text("hello there world".to_string())]);
        let mut rx = llm.stream(&request("p")).await.expect("stream");
        let mut collected = String::new();
        while let Some(chunk) = rx.recv().await {
            collected.push_str(&chunk.expect("chunk"));
        }
        assert_eq!(collected, "hello there world");
    }

    #[test]
    fn script_file_parses() {
        let raw = r#"{"native": false, "turns": [
            {"function_call": {"name": "list_directory", "arguments": {"path": "."}}},
            {"raw": "thinking... {\"name\": \"read_file\", \"arguments\": {\"path\": \"a\"}}"},
            {"text": "done"}
        ]}"#;
        let script: Script = serde_json::from_str(raw).expect("parse");
        assert!(!script.native);
        assert_eq!(script.turns.len(), 3);
        assert_eq!(script.turns[2], ScriptedTurn::Text("done".to_string()));
    }
}
