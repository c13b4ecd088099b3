//! LLM client abstraction consumed by the agent loop.
//!
//! The [`LlmClient`] trait decouples orchestration from transport: HTTP
//! plumbing, retries, and provider-specific request shapes all live behind it.
//! The runner cancels an in-flight call by dropping its future, so
//! implementations must be cancel-safe. Tests and `codeloop replay` use
//! [`scripted::ScriptedLlm`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::types::{FunctionCallResponse, ToolDefinition};

pub mod scripted;

/// Chunks of streamed text, terminated by the sender closing.
pub type TextStream = mpsc::Receiver<Result<String, LlmError>>;

/// One request to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub system_prompt: String,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    /// Network-level failure after the client's own retry policy is exhausted.
    #[error("llm transport failed: {message}")]
    Transport { message: String },
    #[error("llm provider returned {status:?}: {message}")]
    Provider {
        status: Option<u16>,
        message: String,
    },
    #[error("llm request cancelled")]
    Cancelled,
    #[error("{0} is not supported by this client")]
    Unsupported(&'static str),
    #[error("llm script exhausted after {served} responses")]
    ScriptExhausted { served: usize },
    #[error("llm payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Plain text completion.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError>;

    /// Completion that may request a tool call.
    ///
    /// Clients without native function calling return
    /// [`FunctionCallResponse::Text`] with the raw model output; the runner
    /// normalizes it.
    async fn generate_with_functions(
        &self,
        request: &GenerateRequest,
    ) -> Result<FunctionCallResponse, LlmError>;

    async fn stream(&self, request: &GenerateRequest) -> Result<TextStream, LlmError>;

    async fn list_available_models(&self) -> Result<Vec<String>, LlmError>;

    fn supports_native_function_calling(&self) -> bool;

    fn supports_embeddings(&self) -> bool {
        false
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Err(LlmError::Unsupported("embeddings"))
    }
}
