//! Intent classification: provider-backed with a deterministic fallback.
//!
//! The provider path sends the router instructions plus the question and
//! viewport defaults, constrained to the closed classification schema.
//! Any call failure reports to the breaker and falls through to the
//! keyword classifier for this one request — there is no retry.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, instrument, warn};

use relief_llm::schema::classification_schema;
use relief_llm::{CompletionProvider, CompletionRequest};

use crate::breaker::{CircuitBreaker, FailureKind};
use crate::types::{Classification, Filters, Intent, PinKind, DEFAULT_RADIUS_MI};

/// Provider call failures (counter, labels: kind).
const ASSIST_PROVIDER_ERRORS_TOTAL: &str = "assist_provider_errors_total";

/// Fixed follow-up sent when nothing in the question matched.
pub const FOLLOWUP_PROMPT: &str =
    "What would you like to know: shelters, food, flood zones, 311, or community pins?";

/// Router instructions for the provider-backed strategy.
const ROUTER_INSTRUCTIONS: &str = "You are an intent router for a disaster-help map. OUTPUT JSON ONLY.\n\
Allowed intents: pins, shelters, food, flood, feed311, summary, other.\n\
Routing rules:\n\
- If the question is a greeting/small talk or too vague (no clear topic), set needs_clarification=true and followup_question like: \"What would you like to know: shelters, food, flood zones, 311, or community pins?\"\n\
- Otherwise set needs_clarification=false and choose ONE primary intent.\n\
- Map synonyms: flood zone/floodplain/FEMA/DFIRM -> flood; food bank/meal distribution -> food.\n\
- Phrases like 'who is offering help' -> intent=pins, filters.kind='offer'. 'who needs help' -> intent=pins, filters.kind='need'.\n\
- Build filters. If center/radius are missing, use the provided Defaults. If user says \"near me\", keep Defaults.\n\
- time_window_hours only when user asks about recency (e.g., last 24h).\n\
- categories only when the user specifies them (e.g., meals, beds).\n\
Do not answer the question. JSON only.";

static RADIUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"within\s+(\d+(?:\.\d+)?)\s*(?:miles|mi)\b").expect("radius pattern")
});

static TIME_WINDOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:last|past)\s+(\d+)\s*(minutes|min|hours|hrs|days|d)\b")
        .expect("time window pattern")
});

/// Keyword → canonical category table. Any number of matches combine.
const CATEGORY_RULES: &[(&str, &str)] = &[
    ("meals", "Meals"),
    ("food", "Food"),
    ("pantry", "Food"),
    ("beds", "Beds"),
    ("shelter", "Shelter"),
    ("medical", "Medical"),
    ("medicine", "Medical"),
    ("transport", "Transport"),
    ("ride", "Transport"),
    ("supplies", "Supplies"),
    ("water", "Supplies"),
];

/// One priority-ordered intent rule: first matching keyword set wins.
struct IntentRule {
    keywords: &'static [&'static str],
    intent: Intent,
    kind: Option<PinKind>,
}

/// Evaluated top to bottom; substring matches, like the rest of the
/// keyword heuristics.
const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        keywords: &["311", "service request", "non-emergency"],
        intent: Intent::Feed311,
        kind: None,
    },
    IntentRule {
        keywords: &["shelter"],
        intent: Intent::Shelters,
        kind: None,
    },
    IntentRule {
        keywords: &["food", "pantry", "meal"],
        intent: Intent::Food,
        kind: None,
    },
    IntentRule {
        keywords: &["flood", "floodplain", "fema", "dfirm"],
        intent: Intent::Flood,
        kind: None,
    },
    IntentRule {
        keywords: &["offer", "offering help", "who is offering", "who offers"],
        intent: Intent::Pins,
        kind: Some(PinKind::Offer),
    },
    IntentRule {
        keywords: &["need", "needs help", "who needs"],
        intent: Intent::Pins,
        kind: Some(PinKind::Need),
    },
    IntentRule {
        keywords: &["pin"],
        intent: Intent::Pins,
        kind: None,
    },
];

/// Result of a classification attempt.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A well-formed classification (provider or fallback).
    Parsed(Classification),
    /// The provider answered with prose or malformed JSON; the raw text is
    /// kept as a best-effort answer rather than discarded.
    Degraded(String),
}

/// Classifier with an optional provider behind a breaker.
pub struct IntentClassifier {
    provider: Option<Arc<dyn CompletionProvider>>,
    breaker: Arc<CircuitBreaker>,
}

impl IntentClassifier {
    /// Create a classifier. `provider` may be `None` (deterministic only).
    #[must_use]
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { provider, breaker }
    }

    /// Classify a question, preferring the provider when healthy.
    #[instrument(skip_all, fields(question_chars = question.len()))]
    pub async fn classify(
        &self,
        question: &str,
        default_center: Option<[f64; 2]>,
        default_radius: Option<f64>,
    ) -> Outcome {
        if let Some(provider) = &self.provider {
            if self.breaker.healthy() {
                match self
                    .call_provider(provider.as_ref(), question, default_center, default_radius)
                    .await
                {
                    Ok(outcome) => return outcome,
                    Err(err) => {
                        let kind = if err.is_quota() {
                            FailureKind::Quota
                        } else {
                            FailureKind::Transient
                        };
                        let label = if kind == FailureKind::Quota { "quota" } else { "transient" };
                        metrics::counter!(ASSIST_PROVIDER_ERRORS_TOTAL, "kind" => label)
                            .increment(1);
                        self.breaker.report_failure(kind);
                        warn!(error = %err, "classifier provider failed, using fallback");
                    }
                }
            } else {
                debug!("provider unhealthy, using fallback classifier");
            }
        }
        Outcome::Parsed(fallback_classify(question, default_center, default_radius))
    }

    async fn call_provider(
        &self,
        provider: &dyn CompletionProvider,
        question: &str,
        default_center: Option<[f64; 2]>,
        default_radius: Option<f64>,
    ) -> relief_llm::ProviderResult<Outcome> {
        let defaults = match default_center {
            Some([lat, lng]) => format!(
                "center=[{lat}, {lng}], radius_mi={}",
                default_radius.unwrap_or(DEFAULT_RADIUS_MI)
            ),
            None => format!(
                "center=None, radius_mi={}",
                default_radius.unwrap_or(DEFAULT_RADIUS_MI)
            ),
        };
        let prompt = format!("{ROUTER_INSTRUCTIONS}\nUser: {question}\nDefaults: {defaults}");
        let text = provider
            .complete(&CompletionRequest::classification(
                prompt,
                classification_schema(),
            ))
            .await?;
        Ok(parse_provider_output(&text))
    }
}

/// Parse provider output into the strict outcome variant.
///
/// Total coverage: valid JSON matching the schema parses; everything else
/// (prose, truncated JSON, unknown intents) becomes [`Outcome::Degraded`].
pub fn parse_provider_output(text: &str) -> Outcome {
    match serde_json::from_str::<Classification>(text.trim()) {
        Ok(classification) => Outcome::Parsed(classification),
        Err(err) => {
            debug!(error = %err, "provider output not parseable, degrading");
            Outcome::Degraded(text.to_owned())
        }
    }
}

/// Deterministic keyword classifier. Always available, no external calls.
pub fn fallback_classify(
    question: &str,
    default_center: Option<[f64; 2]>,
    default_radius: Option<f64>,
) -> Classification {
    let text = question.trim().to_lowercase();

    let radius_mi = RADIUS_RE
        .captures(&text)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .unwrap_or_else(|| default_radius.unwrap_or(DEFAULT_RADIUS_MI));

    let time_window_hours = TIME_WINDOW_RE.captures(&text).and_then(|caps| {
        let n: f64 = caps[1].parse().ok()?;
        let hours = match &caps[2] {
            unit if unit.starts_with("min") => (n / 60.0).ceil().max(1.0),
            unit if unit.starts_with("hour") || unit.starts_with("hr") => n,
            _ => n * 24.0,
        };
        Some(hours)
    });

    let mut categories: Vec<String> = Vec::new();
    for (keyword, canonical) in CATEGORY_RULES {
        if text.contains(keyword) && !categories.iter().any(|c| c == canonical) {
            categories.push((*canonical).to_owned());
        }
    }

    let matched = INTENT_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| text.contains(k)));
    let (intent, kind) = match matched {
        Some(rule) => (rule.intent, rule.kind),
        None => (Intent::Summary, None),
    };

    let needs_clarification = intent == Intent::Summary;
    Classification {
        intent,
        needs_clarification,
        followup_question: if needs_clarification {
            FOLLOWUP_PROMPT.to_owned()
        } else {
            String::new()
        },
        filters: Filters {
            center: default_center,
            radius_mi: Some(radius_mi),
            kind,
            categories: (!categories.is_empty()).then_some(categories),
            time_window_hours,
        },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // ── Radius parsing ───────────────────────────────────────────────────

    #[test]
    fn within_miles_overrides_default_radius() {
        let c = fallback_classify("shelters within 3 miles", None, Some(10.0));
        assert_eq!(c.filters.radius_mi, Some(3.0));
    }

    #[test]
    fn within_mi_abbreviation_matches() {
        let c = fallback_classify("food within 2.5 mi", None, None);
        assert_eq!(c.filters.radius_mi, Some(2.5));
    }

    #[test]
    fn no_radius_phrase_keeps_default() {
        let c = fallback_classify("shelters near me", None, Some(7.0));
        assert_eq!(c.filters.radius_mi, Some(7.0));
    }

    #[test]
    fn missing_default_radius_falls_back_to_five() {
        let c = fallback_classify("shelters", None, None);
        assert_eq!(c.filters.radius_mi, Some(5.0));
    }

    // ── Time window parsing ──────────────────────────────────────────────

    #[test]
    fn ninety_minutes_rounds_up_to_two_hours() {
        let c = fallback_classify("311 reports in the last 90 minutes", None, None);
        assert_eq!(c.filters.time_window_hours, Some(2.0));
    }

    #[test]
    fn thirty_minutes_floors_at_one_hour() {
        let c = fallback_classify("311 from the past 30 min", None, None);
        assert_eq!(c.filters.time_window_hours, Some(1.0));
    }

    #[test]
    fn hours_pass_through() {
        let c = fallback_classify("311 in the last 24 hours", None, None);
        assert_eq!(c.filters.time_window_hours, Some(24.0));
    }

    #[test]
    fn days_convert_to_hours() {
        let c = fallback_classify("311 over the past 2 days", None, None);
        assert_eq!(c.filters.time_window_hours, Some(48.0));
    }

    #[test]
    fn no_recency_phrase_leaves_window_unset() {
        let c = fallback_classify("311 reports", None, None);
        assert_eq!(c.filters.time_window_hours, None);
    }

    // ── Categories ───────────────────────────────────────────────────────

    #[test]
    fn category_keywords_combine() {
        let c = fallback_classify("pins about water and beds", None, None);
        let cats = c.filters.categories.unwrap();
        assert_eq!(cats, vec!["Beds".to_owned(), "Supplies".to_owned()]);
    }

    #[test]
    fn pantry_maps_to_food_category() {
        let c = fallback_classify("pantry near me", None, None);
        assert!(c.filters.categories.unwrap().contains(&"Food".to_owned()));
    }

    #[test]
    fn no_category_keywords_leave_none() {
        let c = fallback_classify("who needs a pin", None, None);
        assert!(c.filters.categories.is_none());
    }

    // ── Intent priority ──────────────────────────────────────────────────

    #[test]
    fn service_report_keywords_win_first() {
        let c = fallback_classify("311 about food", None, None);
        assert_eq!(c.intent, Intent::Feed311);
    }

    #[test]
    fn shelter_beats_food() {
        let c = fallback_classify("shelter with meals", None, None);
        assert_eq!(c.intent, Intent::Shelters);
    }

    #[test]
    fn flood_keywords_resolve_to_flood() {
        for q in ["flood zones", "fema map", "dfirm panels", "floodplain"] {
            assert_eq!(fallback_classify(q, None, None).intent, Intent::Flood, "{q}");
        }
    }

    #[test]
    fn offering_help_is_pins_offer() {
        let c = fallback_classify("who is offering help", Some([29.76, -95.37]), Some(5.0));
        assert_eq!(c.intent, Intent::Pins);
        assert_eq!(c.filters.kind, Some(PinKind::Offer));
        assert!(!c.needs_clarification);
    }

    #[test]
    fn needs_help_is_pins_need() {
        let c = fallback_classify("who needs help nearby", None, None);
        assert_eq!(c.intent, Intent::Pins);
        assert_eq!(c.filters.kind, Some(PinKind::Need));
    }

    #[test]
    fn bare_pin_mention_is_pins_without_kind() {
        let c = fallback_classify("show community pins", None, None);
        assert_eq!(c.intent, Intent::Pins);
        assert_eq!(c.filters.kind, None);
    }

    #[test]
    fn vague_question_asks_for_clarification() {
        let c = fallback_classify("hello", None, None);
        assert_eq!(c.intent, Intent::Summary);
        assert!(c.needs_clarification);
        assert_eq!(c.followup_question, FOLLOWUP_PROMPT);
    }

    #[test]
    fn defaults_flow_into_filters() {
        let c = fallback_classify("shelters", Some([29.76, -95.37]), Some(5.0));
        assert_eq!(c.filters.center, Some([29.76, -95.37]));
    }

    // ── Provider output parsing ──────────────────────────────────────────

    #[test]
    fn valid_json_parses() {
        let out = parse_provider_output(
            r#"{"intent":"shelters","needs_clarification":false,"followup_question":"","filters":{}}"#,
        );
        assert_matches!(out, Outcome::Parsed(c) if c.intent == Intent::Shelters);
    }

    #[test]
    fn prose_degrades_to_raw_text() {
        let out = parse_provider_output("There are several shelters nearby.");
        assert_matches!(out, Outcome::Degraded(text) if text.contains("shelters"));
    }

    #[test]
    fn unknown_intent_degrades() {
        let out = parse_provider_output(
            r#"{"intent":"weather","needs_clarification":false,"followup_question":"","filters":{}}"#,
        );
        assert_matches!(out, Outcome::Degraded(_));
    }

    // ── Provider selection ───────────────────────────────────────────────

    #[tokio::test]
    async fn no_provider_uses_fallback() {
        let breaker = Arc::new(CircuitBreaker::new(1800, false, false));
        let classifier = IntentClassifier::new(None, breaker);
        let out = classifier.classify("who is offering help", None, None).await;
        assert_matches!(out, Outcome::Parsed(c) => {
            assert_eq!(c.intent, Intent::Pins);
            assert_eq!(c.filters.kind, Some(PinKind::Offer));
        });
    }
}
