//! The end-to-end request state machine.
//!
//! request → rate limit → answer cache → classification cache → classify →
//! fetch → reduce → compose → cache → response. Everything after the
//! rate-limit stage degrades to the deterministic summary fallback; no
//! request path returns an error.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use relief_core::text::clamp_chars;
use relief_llm::CompletionProvider;
use relief_settings::AssistSettings;

use crate::breaker::CircuitBreaker;
use crate::cache::{self, TtlCache};
use crate::classifier::{IntentClassifier, Outcome};
use crate::compose::{compose, summary_sentence};
use crate::fetch::ResourceClient;
use crate::rate_limit::RateLimiter;
use crate::reduce::{ReduceParams, reduce};
use crate::types::{
    AssistResponse, Classification, Query, ResourceCounts, DEFAULT_RADIUS_MI,
};

/// Operation key for the whole-request limiter.
const QNA_OPERATION: &str = "qna";

/// Character budget for answers, including degraded provider text.
const MAX_ANSWER_CHARS: usize = 700;

/// Assist requests (counter, labels: none).
const ASSIST_REQUESTS_TOTAL: &str = "assist_requests_total";
/// Full-answer cache hits (counter).
const ASSIST_CACHE_HITS_TOTAL: &str = "assist_cache_hits_total";
/// Fallback answers served (counter).
const ASSIST_FALLBACKS_TOTAL: &str = "assist_fallbacks_total";
/// Clarification replies served (counter).
const ASSIST_CLARIFICATIONS_TOTAL: &str = "assist_clarifications_total";

/// Provider and breaker diagnostics for `GET /assist-status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Whether a provider API key is configured.
    pub has_key: bool,
    /// Whether the administrative kill switch is on.
    pub disabled: bool,
    /// Whether the breaker cooldown is active right now.
    pub cooling_down: bool,
    /// Provider model identifier, when a provider is wired.
    pub model: Option<String>,
    /// Resource Store base URL.
    pub resource_base_url: String,
}

/// The query orchestrator: owns every stateful pipeline component.
///
/// Explicitly constructed (never ambient); tests build isolated instances
/// with their own caches, limiter, and breaker.
pub struct AssistService {
    answer_cache: TtlCache<AssistResponse>,
    classification_cache: TtlCache<Classification>,
    limiter: RateLimiter,
    breaker: Arc<CircuitBreaker>,
    classifier: IntentClassifier,
    resources: ResourceClient,
    status: StatusReport,
}

impl AssistService {
    /// Wire the pipeline from settings and an optional provider.
    ///
    /// `provider = None` means every request takes the deterministic path.
    #[must_use]
    pub fn new(settings: &AssistSettings, provider: Option<Arc<dyn CompletionProvider>>) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            settings.llm_cooldown_secs,
            provider.is_some(),
            settings.disable_llm,
        ));
        let status = StatusReport {
            has_key: settings.has_api_key(),
            disabled: settings.disable_llm,
            cooling_down: false,
            model: provider.as_ref().map(|p| p.model().to_owned()),
            resource_base_url: settings.resource_base_url.clone(),
        };
        Self {
            answer_cache: TtlCache::new(settings.cache_ttl_secs),
            classification_cache: TtlCache::new(settings.cache_ttl_secs),
            limiter: RateLimiter::new(1, settings.rate_window_secs),
            breaker: Arc::clone(&breaker),
            classifier: IntentClassifier::new(provider, breaker),
            resources: ResourceClient::new(
                settings.resource_base_url.clone(),
                settings.fetch_timeout_secs,
            ),
            status,
        }
    }

    /// Current provider/breaker diagnostics.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            cooling_down: self.breaker.cooling_down_at(chrono::Utc::now()),
            ..self.status.clone()
        }
    }

    /// Answer one question. Always returns a well-formed response.
    #[instrument(skip(self, query), fields(client = %client_id))]
    pub async fn answer(&self, client_id: &str, query: &Query) -> AssistResponse {
        metrics::counter!(ASSIST_REQUESTS_TOTAL).increment(1);

        // Soft per-client cooldown: throttled requests get the summary
        // fallback, never an error, and write nothing to the cache.
        if !self.limiter.allow(client_id, QNA_OPERATION) {
            let wait = self.limiter.retry_after_secs(client_id, QNA_OPERATION);
            debug!(wait_secs = wait, "client rate-limited");
            return self
                .fallback_answer(query, format!("client rate-limited {wait}s"))
                .await;
        }

        let answer_key = cache::answer_key(&query.question, query.center, query.radius_mi);
        if let Some(hit) = self.answer_cache.get(&answer_key) {
            metrics::counter!(ASSIST_CACHE_HITS_TOTAL).increment(1);
            debug!("full-answer cache hit");
            return hit;
        }

        let classification = match self.classify_cached(query).await {
            Ok(classification) => classification,
            Err(degraded_text) => {
                // Malformed provider output: keep the raw text as an opaque
                // answer instead of discarding it.
                let response = AssistResponse::fallback(
                    clamp_chars(&degraded_text, MAX_ANSWER_CHARS),
                    None,
                    Some("unstructured provider output".to_owned()),
                );
                self.answer_cache.insert(&answer_key, response.clone());
                return response;
            }
        };

        if classification.needs_clarification {
            metrics::counter!(ASSIST_CLARIFICATIONS_TOTAL).increment(1);
            let ask = if classification.followup_question.is_empty() {
                "What resource are you asking about?".to_owned()
            } else {
                classification.followup_question
            };
            let response = AssistResponse::Ask { ask };
            self.answer_cache.insert(&answer_key, response.clone());
            return response;
        }

        // Classifier filters win over the request, which wins over defaults.
        let filters = classification.filters;
        let center = filters
            .center
            .or(query.center)
            .map(|[lat, lng]| (lat, lng));
        let radius_mi = filters
            .radius_mi
            .or(query.radius_mi)
            .unwrap_or(DEFAULT_RADIUS_MI);
        let params = ReduceParams {
            intent: classification.intent,
            center,
            radius_mi: Some(radius_mi),
            kind: filters.kind,
            categories: filters.categories,
            time_window_hours: filters.time_window_hours,
        };

        let raw = match self.resources.fetch().await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "context fetch failed");
                return self.fallback_answer(query, format!("context error: {err}")).await;
            }
        };

        let snapshot = reduce(&raw, &params);
        let response = AssistResponse::deterministic(compose(&snapshot));
        self.answer_cache.insert(&answer_key, response.clone());
        info!(intent = ?params.intent, "answered");
        response
    }

    /// Classification with its own cache so repeated questions skip the
    /// provider even after the answer entry expires.
    async fn classify_cached(&self, query: &Query) -> Result<Classification, String> {
        let key = cache::classification_key(&query.question, query.center, query.radius_mi);
        if let Some(hit) = self.classification_cache.get(&key) {
            debug!("classification cache hit");
            return Ok(hit);
        }
        match self
            .classifier
            .classify(&query.question, query.center, query.radius_mi)
            .await
        {
            Outcome::Parsed(classification) => {
                self.classification_cache.insert(&key, classification.clone());
                Ok(classification)
            }
            Outcome::Degraded(text) => Err(text),
        }
    }

    /// The degraded path: summary counts for the caller's viewport.
    ///
    /// Never writes the answer cache — a failed fetch should not suppress
    /// recovery for a full TTL, and the per-client cooldown already bounds
    /// the retry rate.
    async fn fallback_answer(&self, query: &Query, reason: String) -> AssistResponse {
        metrics::counter!(ASSIST_FALLBACKS_TOTAL).increment(1);
        match self.resources.fetch().await {
            Ok(raw) => {
                let params =
                    ReduceParams::summary(query.center_latlng(), Some(query.radius_or_default()));
                let snapshot = reduce(&raw, &params);
                let counts = ResourceCounts {
                    pins: snapshot.pins.len(),
                    shelters: snapshot.shelters.len(),
                    food: snapshot.food.len(),
                    feed311: snapshot.feed311.len(),
                };
                AssistResponse::fallback(
                    summary_sentence(counts),
                    Some(counts),
                    (!reason.is_empty()).then_some(reason),
                )
            }
            Err(err) => {
                warn!(error = %err, "fallback fetch failed");
                AssistResponse::fallback(
                    "Resource data is unavailable right now.",
                    None,
                    Some(format!("{reason}; fetch error: {err}")),
                )
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
