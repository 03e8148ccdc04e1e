//! LLM gateway: the single seam between the engine and the model.
//!
//! The rest of the crate sees the model as `llm(prompt, schema) →
//! structured_json` at temperature 0. This module owns the retry loop,
//! per-call timeout, and JSON extraction; schema validation lives with the
//! callers that know their shapes.

pub mod endpoint;
pub mod error;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

pub use endpoint::{ChatBackend, EndpointAdapter};
pub use error::{ErrorContext, GatewayError};
pub use types::{LlmRequest, LlmResponse, Message, Role};

/// The gateway trait the pipeline depends on. Tests substitute scripted
/// implementations.
#[async_trait::async_trait]
pub trait LlmGateway: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub call_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
            call_timeout: Duration::from_secs(120),
        }
    }
}

/// Gateway wrapper that adds bounded retries with exponential backoff and a
/// per-call timeout around any backend.
pub struct RetryingGateway<B: ChatBackend> {
    backend: B,
    config: GatewayConfig,
}

impl<B: ChatBackend> RetryingGateway<B> {
    pub fn new(backend: B, config: GatewayConfig) -> Self {
        Self { backend, config }
    }

    async fn complete_inner(&self, req: &LlmRequest) -> Result<LlmResponse, GatewayError> {
        let mut last_error: Option<GatewayError> = None;

        for attempt in 0..=self.config.max_retries {
            let result = timeout(self.config.call_timeout, self.backend.complete(req))
                .await
                .unwrap_or(Err(GatewayError::Timeout(self.config.call_timeout)));

            match result {
                Ok(resp) => return Ok(resp),
                Err(err) => {
                    eprintln!(
                        "[gateway] {} attempt {}/{} failed: {}",
                        req.caller,
                        attempt + 1,
                        self.config.max_retries + 1,
                        err.code()
                    );
                    if !err.is_retryable() || attempt == self.config.max_retries {
                        return Err(err);
                    }
                    let delay = backoff_delay(self.config.retry_base_delay, attempt);
                    last_error = Some(err);
                    sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| GatewayError::endpoint("unknown error", false)))
    }
}

#[async_trait::async_trait]
impl<B: ChatBackend> LlmGateway for RetryingGateway<B> {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, GatewayError> {
        self.complete_inner(&req).await
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u64.pow(attempt.min(5));
    base * multiplier as u32
}

/// Run a completion and parse the content as a JSON value.
///
/// Accepts fenced ```json blocks and leading prose around the outermost
/// object; anything that still fails to parse is a `Schema` error, which
/// callers treat as a recoverable per-unit validation failure.
pub async fn complete_json(
    gateway: &Arc<dyn LlmGateway>,
    req: LlmRequest,
) -> Result<serde_json::Value, GatewayError> {
    let resp = gateway.complete(req).await?;
    extract_json(&resp.content)
}

/// Extract the outermost JSON object from model output.
pub fn extract_json(content: &str) -> Result<serde_json::Value, GatewayError> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    // Fenced block.
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            if let Ok(value) = serde_json::from_str(after[..end].trim()) {
                return Ok(value);
            }
        }
    }

    // Outermost braces.
    if let (Some(open), Some(close)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if open < close {
            if let Ok(value) = serde_json::from_str(&trimmed[open..=close]) {
                return Ok(value);
            }
        }
    }

    Err(GatewayError::schema(format!(
        "no JSON object in model output ({} chars)",
        content.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_handles_bare_fenced_and_noisy_output() {
        let bare = r#"{"a": 1}"#;
        assert_eq!(extract_json(bare).unwrap()["a"], 1);

        let fenced = "Here you go:\n```json\n{\"a\": 2}\n```";
        assert_eq!(extract_json(fenced).unwrap()["a"], 2);

        let noisy = "Sure. {\"a\": 3} Hope that helps.";
        assert_eq!(extract_json(noisy).unwrap()["a"], 3);

        assert!(extract_json("no json here").is_err());
    }
}
