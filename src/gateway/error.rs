//! Error types for the LLM gateway.

use std::time::Duration;
use thiserror::Error;

/// Additional context from endpoint errors for debugging.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// HTTP status code from the endpoint.
    pub http_status: Option<u16>,
    /// Endpoint-specific error code (e.g. "rate_limit_exceeded").
    pub endpoint_code: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.endpoint_code = Some(code.into());
        self
    }
}

/// Errors that can occur when calling the model endpoint.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Rate limited - caller should retry after the specified duration.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        retry_after: Duration,
        context: Option<ErrorContext>,
    },

    /// Invalid request - permanent error, don't retry.
    #[error("invalid request: {message}")]
    InvalidRequest {
        message: String,
        context: Option<ErrorContext>,
    },

    /// The model refused to produce the requested output - permanent error.
    #[error("refused: {message}")]
    Refused {
        message: String,
        context: Option<ErrorContext>,
    },

    /// Endpoint error - may be retryable.
    #[error("endpoint error: {message}")]
    Endpoint {
        message: String,
        retryable: bool,
        context: Option<ErrorContext>,
    },

    /// Request timed out - retryable.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The model produced output that does not parse as the requested
    /// schema. Treated as a per-unit validation failure by callers.
    #[error("schema violation: {0}")]
    Schema(String),

    /// HTTP/network error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error (missing endpoint, etc.).
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn rate_limited(retry_after: Duration, context: ErrorContext) -> Self {
        Self::RateLimited {
            retry_after,
            context: Some(context),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            context: None,
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self::Refused {
            message: message.into(),
            context: None,
        }
    }

    pub fn endpoint(message: impl Into<String>, retryable: bool) -> Self {
        Self::Endpoint {
            message: message.into(),
            retryable,
            context: None,
        }
    }

    pub fn endpoint_with_context(
        message: impl Into<String>,
        retryable: bool,
        context: ErrorContext,
    ) -> Self {
        Self::Endpoint {
            message: message.into(),
            retryable,
            context: Some(context),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Timeout(_) => true,
            Self::Endpoint { retryable, .. } => *retryable,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::InvalidRequest { .. } => false,
            Self::Refused { .. } => false,
            Self::Schema(_) => false,
            Self::Config(_) => false,
        }
    }

    /// Short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Refused { .. } => "refused",
            Self::Endpoint { .. } => "endpoint_error",
            Self::Timeout(_) => "timeout",
            Self::Schema(_) => "schema_violation",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
        }
    }
}
