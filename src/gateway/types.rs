//! Request/response types for the LLM gateway.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Chat message role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A structured-output completion request.
///
/// The engine treats the model as a pure function of the prompt: every
/// request runs at temperature 0 with JSON output enforced, so identical
/// prompts produce identical structured responses.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    /// Which code path made this call, for logging.
    /// Use a static string like "ingest::phase1" or "synthesize::minister".
    pub caller: &'static str,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, caller: &'static str) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            caller,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Completion response.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Raw model output. Callers validate it against their schema.
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency: Duration,
}
