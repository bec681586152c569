//! # relief-settings
//!
//! Configuration for the assist service, loaded from environment variables
//! over compiled defaults.
//!
//! Settings are explicitly constructed and passed into services (no global
//! singleton) so tests can build isolated instances. Invalid numeric values
//! log a warning and keep the default — configuration never crashes the
//! process.
//!
//! Recognized variables:
//!
//! | Variable                   | Default                  |
//! |----------------------------|--------------------------|
//! | `ASSIST_CACHE_TTL`         | 900 (seconds)            |
//! | `ASSIST_RATE_WINDOW_SEC`   | 8 (seconds)              |
//! | `ASSIST_LLM_COOLDOWN_SEC`  | 1800 (seconds)           |
//! | `ASSIST_DISABLE_LLM`       | false (`1`/`true`/`yes`) |
//! | `ASSIST_FETCH_TIMEOUT_SEC` | 10 (seconds)             |
//! | `GEMINI_API_KEY`           | unset                    |
//! | `GEMINI_MODEL`             | `gemini-1.5-flash`       |
//! | `SELF_BASE_URL`            | `http://127.0.0.1:8000`  |

#![deny(unsafe_code)]

use serde::Serialize;

/// Default language model identifier.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default Resource Store base URL (the map app's own read API).
pub const DEFAULT_RESOURCE_BASE_URL: &str = "http://127.0.0.1:8000";

/// Assist service configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AssistSettings {
    /// TTL for both the full-answer and classification caches, seconds.
    pub cache_ttl_secs: u64,
    /// Minimum seconds between whole Q&A requests per client.
    pub rate_window_secs: u64,
    /// Breaker cooldown after a provider quota failure, seconds.
    pub llm_cooldown_secs: u64,
    /// Administrative kill switch for the language model provider.
    pub disable_llm: bool,
    /// Per-call timeout for Resource Store fetches, seconds.
    pub fetch_timeout_secs: u64,
    /// Provider API key; `None` means the provider is unconfigured and the
    /// deterministic classifier handles everything.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Provider model identifier.
    pub model: String,
    /// Resource Store base URL.
    pub resource_base_url: String,
}

impl Default for AssistSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 900,
            rate_window_secs: 8,
            llm_cooldown_secs: 1800,
            disable_llm: false,
            fetch_timeout_secs: 10,
            api_key: None,
            model: DEFAULT_MODEL.to_owned(),
            resource_base_url: DEFAULT_RESOURCE_BASE_URL.to_owned(),
        }
    }
}

impl AssistSettings {
    /// Load settings from the process environment over defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings from an arbitrary lookup function.
    ///
    /// Tests pass a closure over a map instead of mutating the process
    /// environment (env vars are process-global and tests run in parallel).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            cache_ttl_secs: parse_secs(&lookup, "ASSIST_CACHE_TTL", defaults.cache_ttl_secs),
            rate_window_secs: parse_secs(
                &lookup,
                "ASSIST_RATE_WINDOW_SEC",
                defaults.rate_window_secs,
            ),
            llm_cooldown_secs: parse_secs(
                &lookup,
                "ASSIST_LLM_COOLDOWN_SEC",
                defaults.llm_cooldown_secs,
            ),
            disable_llm: lookup("ASSIST_DISABLE_LLM")
                .is_some_and(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes")),
            fetch_timeout_secs: parse_secs(
                &lookup,
                "ASSIST_FETCH_TIMEOUT_SEC",
                defaults.fetch_timeout_secs,
            ),
            api_key: lookup("GEMINI_API_KEY").and_then(|v| strip_quotes(&v)),
            model: lookup("GEMINI_MODEL")
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.model),
            resource_base_url: lookup("SELF_BASE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_owned())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.resource_base_url),
        }
    }

    /// Whether a provider key is present (after quote stripping).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Parse a positive integer of seconds, falling back to `default`.
fn parse_secs(lookup: impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    match lookup(name) {
        None => default,
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(v) if v > 0 => v,
            _ => {
                tracing::warn!(var = name, value = %raw, "invalid duration, using default");
                default
            }
        },
    }
}

/// Trim whitespace and surrounding quotes; empty results become `None`.
///
/// Keys pasted into `.env` files routinely carry stray quotes.
fn strip_quotes(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_matches('"').trim_matches('\'').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_owned())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
