//! HTTP adapter for an OpenAI-compatible chat completions endpoint.
//!
//! Local or remote; anything that speaks `/chat/completions` works. All
//! requests run at temperature 0 with JSON output enforced.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::error::{ErrorContext, GatewayError};
use super::types::{LlmRequest, LlmResponse, Message, Role};

/// Maximum allowed response content length (1MB).
const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Maximum allowed input characters (~500k chars ≈ 125k tokens).
const MAX_INPUT_CHARS: usize = 500_000;

/// Trait for chat completion backends.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse, GatewayError>;
}

/// OpenAI-compatible endpoint adapter.
#[derive(Debug, Clone)]
pub struct EndpointAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl EndpointAdapter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        Self::with_config(base_url, timeout, None)
    }

    /// Create with an optional bearer token for hosted endpoints.
    pub fn with_config(
        base_url: impl Into<String>,
        timeout: Duration,
        api_key: Option<String>,
    ) -> Result<Self, GatewayError> {
        let base_url = base_url.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let auth = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| GatewayError::config("Invalid API key format"))?;
            headers.insert(AUTHORIZATION, auth);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| GatewayError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Check if the message is a refusal rather than structured output.
    fn is_refusal(msg: &str) -> bool {
        let l = msg.trim_start().to_lowercase();
        let first_line = l.lines().next().unwrap_or("");

        const PREFIXES: &[&str] = &[
            "refus",
            "i cannot",
            "i can't",
            "i won't",
            "i will not",
            "i am unable to",
            "i'm unable to",
            "unable to comply",
            "unable to assist",
        ];

        PREFIXES.iter().any(|p| first_line.starts_with(p))
    }
}

// =============================================================================
// API types
// =============================================================================

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

impl From<&Message> for ApiMessage {
    fn from(m: &Message) -> Self {
        Self {
            role: match m.role {
                Role::System => "system".to_string(),
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: m.content.clone(),
        }
    }
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Option<Vec<Choice>>,
    usage: Option<Usage>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
    code: Option<String>,
}

// =============================================================================
// Backend impl
// =============================================================================

#[async_trait]
impl ChatBackend for EndpointAdapter {
    async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse, GatewayError> {
        let total_chars: usize = req.messages.iter().map(|m| m.content.len()).sum();
        if total_chars > MAX_INPUT_CHARS {
            return Err(GatewayError::invalid_request(format!(
                "Input too large: {total_chars} chars (max {MAX_INPUT_CHARS})"
            )));
        }

        let start = Instant::now();
        let messages: Vec<ApiMessage> = req.messages.iter().map(ApiMessage::from).collect();

        let api_req = ChatApiRequest {
            model: &req.model,
            messages: &messages,
            temperature: 0.0,
            max_tokens: req.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let mut response = self
            .client
            .post(self.chat_url())
            .json(&api_req)
            .send()
            .await?;

        let status = response.status();

        // Stream the body to enforce the size limit.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let new_len = bytes.len() + chunk.len();
            if new_len > MAX_RESPONSE_LEN {
                return Err(GatewayError::endpoint(
                    format!("Response too large: {new_len} bytes"),
                    false,
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        let body = String::from_utf8_lossy(&bytes).to_string();

        let ctx = ErrorContext::new().with_status(status.as_u16());

        if !status.is_success() {
            if let Ok(parsed) = serde_json::from_str::<ChatApiResponse>(&body) {
                if let Some(error) = parsed.error {
                    let message = error.message.unwrap_or_default();
                    let ctx = match error.code {
                        Some(code) => ctx.with_code(code),
                        None => ctx,
                    };
                    return Err(match status.as_u16() {
                        429 => GatewayError::rate_limited(Duration::from_secs(30), ctx),
                        _ => GatewayError::endpoint_with_context(
                            message,
                            status.as_u16() >= 500,
                            ctx,
                        ),
                    });
                }
            }
            return Err(match status.as_u16() {
                429 => GatewayError::rate_limited(Duration::from_secs(30), ctx),
                code => GatewayError::endpoint_with_context(
                    format!("HTTP {code}"),
                    code >= 500,
                    ctx,
                ),
            });
        }

        let parsed: ChatApiResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::endpoint(format!("Unparseable response: {e}"), false))?;

        if let Some(error) = parsed.error {
            return Err(GatewayError::endpoint(
                error.message.unwrap_or_default(),
                false,
            ));
        }

        let content = parsed
            .choices
            .and_then(|mut c| c.drain(..).next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(GatewayError::endpoint("Empty completion", true));
        }
        if Self::is_refusal(&content) {
            let first_line = content.lines().next().unwrap_or("").to_string();
            return Err(GatewayError::refused(first_line));
        }

        let usage = parsed.usage.unwrap_or(Usage {
            prompt_tokens: None,
            completion_tokens: None,
        });

        Ok(LlmResponse {
            content,
            input_tokens: usage.prompt_tokens.unwrap_or(0),
            output_tokens: usage.completion_tokens.unwrap_or(0),
            latency: start.elapsed(),
        })
    }
}
