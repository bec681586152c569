//! Wire and domain types for the assist pipeline.

use relief_core::geo::LatLng;
use serde::{Deserialize, Serialize};

/// Default viewport radius in miles when the caller supplies none.
pub const DEFAULT_RADIUS_MI: f64 = 5.0;

/// Inbound question plus optional viewport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Free-text question.
    pub question: String,
    /// Viewport center as `[lat, lng]`.
    #[serde(default)]
    pub center: Option<[f64; 2]>,
    /// Viewport radius in statute miles; defaults to 5.
    #[serde(default)]
    pub radius_mi: Option<f64>,
}

impl Query {
    /// Viewport center as a `(lat, lng)` tuple.
    pub fn center_latlng(&self) -> Option<LatLng> {
        self.center.map(|[lat, lng]| (lat, lng))
    }

    /// Radius with the default applied.
    pub fn radius_or_default(&self) -> f64 {
        self.radius_mi.unwrap_or(DEFAULT_RADIUS_MI)
    }
}

/// The resolved topic of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Community help-request pins.
    Pins,
    /// Shelter locations.
    Shelters,
    /// Food and supply sites.
    Food,
    /// Flood reference layers (no live collection behind it).
    Flood,
    /// Municipal 311 service reports.
    Feed311,
    /// Cross-collection overview.
    Summary,
    /// Anything else the classifier could not place.
    Other,
}

/// Whether a pin asks for help or offers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinKind {
    /// A request for help.
    Need,
    /// An offer of help.
    Offer,
}

impl PinKind {
    /// Lowercase wire form, matching pin records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Need => "need",
            Self::Offer => "offer",
        }
    }
}

/// Filters resolved by classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filters {
    /// Center override as `[lat, lng]`.
    #[serde(default)]
    pub center: Option<[f64; 2]>,
    /// Radius override in miles.
    #[serde(default)]
    pub radius_mi: Option<f64>,
    /// Pin kind filter.
    #[serde(default)]
    pub kind: Option<PinKind>,
    /// Category filter; any match keeps the pin.
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    /// Recency horizon for service reports, hours.
    #[serde(default)]
    pub time_window_hours: Option<f64>,
}

/// Output of intent classification.
///
/// When `needs_clarification` is set, `followup_question` is the reply and
/// `filters` are ignored downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    /// Resolved intent.
    pub intent: Intent,
    /// True when the question was too vague to route.
    pub needs_clarification: bool,
    /// Clarifying question to send back; empty unless clarification is needed.
    #[serde(default)]
    pub followup_question: String,
    /// Resolved filter set.
    #[serde(default)]
    pub filters: Filters,
}

/// One ranked entry in a composed answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerItem {
    /// Human-readable line for the entry.
    pub label: String,
    /// Distance from the viewport center, miles, when computable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_mi: Option<f64>,
    /// Source record id, when the collection carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// Latitude of the entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    /// Longitude of the entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    /// Pin kind, for pin entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Collection tag: `pin`, `shelter`, `food`, `311`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
}

impl AnswerItem {
    /// A bare label entry (summary bullets).
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            distance_mi: None,
            id: None,
            lat: None,
            lng: None,
            kind: None,
            item_type: None,
        }
    }
}

/// Deterministic, template-driven answer for one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedAnswer {
    /// Headline, e.g. `Shelters nearby: 4`.
    pub title: String,
    /// Secondary line, e.g. `Within ~5 mi`.
    pub subtitle: String,
    /// Ranked entries (at most 3, except summary bullets).
    pub items: Vec<AnswerItem>,
    /// Prose rendering, clamped to 700 characters.
    pub answer: String,
}

/// How the final answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    /// Full pipeline: classified, fetched, reduced, composed.
    Deterministic,
    /// Degraded summary path.
    Fallback,
}

/// Per-collection counts reported by the fallback path.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourceCounts {
    /// Community pins in view.
    pub pins: usize,
    /// Shelters in view.
    pub shelters: usize,
    /// Food/supply sites in view.
    pub food: usize,
    /// 311 reports in view.
    pub feed311: usize,
}

/// UI block attached to a full answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerUi {
    /// Headline.
    pub title: String,
    /// Secondary line.
    pub subtitle: String,
    /// Ranked entries.
    pub items: Vec<AnswerItem>,
}

/// Body of a non-clarification response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerBody {
    /// Production mode.
    pub mode: AnswerMode,
    /// Prose answer, clamped to 700 characters.
    pub answer: String,
    /// Structured UI block, absent on fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<AnswerUi>,
    /// Supporting counts, present on fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support: Option<Support>,
    /// Diagnostic reason for degraded answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Supporting evidence for a fallback answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Support {
    /// Per-collection counts.
    pub counts: ResourceCounts,
}

/// The single response shape of `POST /assist-query`: either a clarifying
/// question or an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssistResponse {
    /// Clarification request.
    Ask {
        /// The clarifying question.
        ask: String,
    },
    /// Structured answer.
    Answer(AnswerBody),
}

impl AssistResponse {
    /// Build the deterministic answer for a composed result.
    pub fn deterministic(composed: ComposedAnswer) -> Self {
        Self::Answer(AnswerBody {
            mode: AnswerMode::Deterministic,
            answer: composed.answer.clone(),
            ui: Some(AnswerUi {
                title: composed.title,
                subtitle: composed.subtitle,
                items: composed.items,
            }),
            support: None,
            reason: None,
        })
    }

    /// Build a fallback answer with optional counts and reason.
    pub fn fallback(
        answer: impl Into<String>,
        counts: Option<ResourceCounts>,
        reason: Option<String>,
    ) -> Self {
        Self::Answer(AnswerBody {
            mode: AnswerMode::Fallback,
            answer: answer.into(),
            ui: None,
            support: counts.map(|c| Support { counts: c }),
            reason,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── Query ────────────────────────────────────────────────────────────

    #[test]
    fn radius_defaults_to_five() {
        let q: Query = serde_json::from_value(json!({"question": "hi"})).unwrap();
        assert!(q.radius_mi.is_none());
        assert!((q.radius_or_default() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn center_deserializes_as_lat_lng_pair() {
        let q: Query =
            serde_json::from_value(json!({"question": "hi", "center": [29.76, -95.37]})).unwrap();
        assert_eq!(q.center_latlng(), Some((29.76, -95.37)));
    }

    // ── Classification wire shape ────────────────────────────────────────

    #[test]
    fn classification_parses_provider_shape() {
        let c: Classification = serde_json::from_value(json!({
            "intent": "pins",
            "needs_clarification": false,
            "followup_question": "",
            "filters": {"kind": "offer", "radius_mi": 3.0}
        }))
        .unwrap();
        assert_eq!(c.intent, Intent::Pins);
        assert_eq!(c.filters.kind, Some(PinKind::Offer));
    }

    #[test]
    fn unknown_intent_fails_to_parse() {
        let res: Result<Classification, _> = serde_json::from_value(json!({
            "intent": "weather",
            "needs_clarification": false,
            "followup_question": "",
            "filters": {}
        }));
        assert!(res.is_err());
    }

    // ── Response serialization ───────────────────────────────────────────

    #[test]
    fn ask_serializes_to_single_field() {
        let res = AssistResponse::Ask { ask: "which?".into() };
        assert_eq!(serde_json::to_value(&res).unwrap(), json!({"ask": "which?"}));
    }

    #[test]
    fn deterministic_answer_carries_ui() {
        let res = AssistResponse::deterministic(ComposedAnswer {
            title: "t".into(),
            subtitle: "s".into(),
            items: vec![AnswerItem::labeled("x")],
            answer: "a".into(),
        });
        let v = serde_json::to_value(&res).unwrap();
        assert_eq!(v["mode"], "deterministic");
        assert_eq!(v["ui"]["title"], "t");
        assert!(v.get("reason").is_none());
    }

    #[test]
    fn fallback_answer_omits_ui_and_carries_reason() {
        let res = AssistResponse::fallback(
            "In view: 0 pins",
            Some(ResourceCounts::default()),
            Some("context error".into()),
        );
        let v = serde_json::to_value(&res).unwrap();
        assert_eq!(v["mode"], "fallback");
        assert!(v.get("ui").is_none());
        assert_eq!(v["support"]["counts"]["pins"], 0);
        assert_eq!(v["reason"], "context error");
    }
}
