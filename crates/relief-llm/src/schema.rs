//! Structured-output schema for the intent classifier.

use serde_json::{Value, json};

/// The closed set of intents the classifier may produce.
pub const INTENTS: [&str; 7] = [
    "pins", "shelters", "food", "flood", "feed311", "summary", "other",
];

/// Response schema constraining classifier output to the seven
/// `Classification` fields with `intent` restricted to the closed enum.
pub fn classification_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "intent": {"type": "string", "enum": INTENTS},
            "needs_clarification": {"type": "boolean"},
            "followup_question": {"type": "string"},
            "filters": {
                "type": "object",
                "properties": {
                    "center": {"type": "array", "items": {"type": "number"}},
                    "radius_mi": {"type": "number"},
                    "kind": {"type": "string", "enum": ["need", "offer"]},
                    "categories": {"type": "array", "items": {"type": "string"}},
                    "time_window_hours": {"type": "number"},
                },
            },
        },
        "required": ["intent", "needs_clarification", "followup_question", "filters"],
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_restricts_intent_to_closed_enum() {
        let schema = classification_schema();
        let intents = schema["properties"]["intent"]["enum"].as_array().unwrap();
        assert_eq!(intents.len(), 7);
        assert!(intents.iter().any(|v| v == "feed311"));
    }

    #[test]
    fn schema_requires_all_top_level_fields() {
        let schema = classification_schema();
        let required = schema["required"].as_array().unwrap();
        for field in [
            "intent",
            "needs_clarification",
            "followup_question",
            "filters",
        ] {
            assert!(required.iter().any(|v| v == field), "missing {field}");
        }
    }

    #[test]
    fn filter_kind_is_need_or_offer_only() {
        let schema = classification_schema();
        let kinds = schema["properties"]["filters"]["properties"]["kind"]["enum"]
            .as_array()
            .unwrap();
        assert_eq!(kinds, &[json!("need"), json!("offer")]);
    }
}
