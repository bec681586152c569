//! Provider trait and error taxonomy.

use async_trait::async_trait;
use serde_json::Value;

/// Result alias for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors from a completion round trip.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("provider http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success API status other than rate limiting.
    #[error("provider api error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },

    /// HTTP 429 or an explicit quota signal from the provider.
    #[error("provider rate limited: {message}")]
    RateLimited {
        /// Error message extracted from the response body.
        message: String,
    },

    /// A 2xx response that carried no usable text.
    #[error("provider returned no text")]
    EmptyResponse,
}

impl ProviderError {
    /// Whether this failure indicates quota exhaustion or rate limiting.
    ///
    /// These are the failures likely to repeat on every subsequent call,
    /// and the only ones that should trip the circuit breaker.
    pub fn is_quota(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api { status, message } => {
                *status == 429 || message.to_lowercase().contains("quota")
            }
            Self::Http(_) | Self::EmptyResponse => false,
        }
    }
}

/// A single text-completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Full prompt text (instructions + user content).
    pub prompt: String,
    /// Optional structured-output schema; when set, the provider is asked
    /// for JSON constrained to this shape.
    pub response_schema: Option<Value>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling cutoff.
    pub top_p: f32,
}

impl CompletionRequest {
    /// Build a low-temperature request suitable for classification.
    pub fn classification(prompt: impl Into<String>, schema: Value) -> Self {
        Self {
            prompt: prompt.into(),
            response_schema: Some(schema),
            temperature: 0.1,
            top_p: 0.1,
        }
    }
}

/// The seam between the classifier and any concrete language model.
///
/// Implementations perform exactly one round trip per call; retry and
/// degradation policy live with the caller.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Model identifier, for logging and the status endpoint.
    fn model(&self) -> &str;

    /// Run one completion and return the raw response text.
    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
