//! Deterministic answer composition.
//!
//! Pure templates over a [`ContextSnapshot`]: nearest-3 ranking for the
//! location intents, category frequencies for 311, raw counts for
//! summaries. The prose answer is always clamped to 700 characters.

use relief_core::geo::{self, LatLng};
use relief_core::text::clamp_chars;

use crate::reduce::ContextSnapshot;
use crate::types::{AnswerItem, ComposedAnswer, Intent, PinKind, ResourceCounts};

/// Items shown per answer.
const TOP_N: usize = 3;

/// Character budget for the prose answer.
const MAX_ANSWER_CHARS: usize = 700;

/// Appended to every empty-result message.
const SUGGESTION: &str = " Try zooming in or increasing the radius for more results.";

/// Compose the answer for a reduced snapshot.
pub fn compose(snapshot: &ContextSnapshot) -> ComposedAnswer {
    let composed = match snapshot.intent {
        Intent::Pins => compose_pins(snapshot),
        Intent::Shelters => compose_shelters(snapshot),
        Intent::Food => compose_food(snapshot),
        Intent::Feed311 => compose_feed311(snapshot),
        Intent::Flood | Intent::Summary | Intent::Other => compose_summary(snapshot),
    };
    ComposedAnswer {
        answer: clamp_chars(&composed.answer, MAX_ANSWER_CHARS).to_owned(),
        ..composed
    }
}

/// One-line summary sentence for a set of counts (shared with the
/// fallback path).
pub fn summary_sentence(counts: ResourceCounts) -> String {
    format!(
        "In view: {} pins, {} shelters, {} food sites, {} 311 points.",
        counts.pins, counts.shelters, counts.food, counts.feed311
    )
}

fn compose_pins(snapshot: &ContextSnapshot) -> ComposedAnswer {
    // The kind filter is re-applied here; not every snapshot source has
    // already done so.
    let pins: Vec<_> = match snapshot.kind {
        Some(kind) => snapshot
            .pins
            .iter()
            .filter(|p| p.kind.as_deref() == Some(kind.as_str()))
            .collect(),
        None => snapshot.pins.iter().collect(),
    };

    let noun = match snapshot.kind {
        Some(PinKind::Offer) => "offers",
        Some(PinKind::Need) => "needs",
        None => "pins",
    };
    if pins.is_empty() {
        return empty_answer(format!("No {noun} found in this view."));
    }

    let ranked = nearest(&pins, snapshot.center, |p| (p.lat, p.lng));
    let items: Vec<AnswerItem> = ranked
        .iter()
        .map(|(p, distance)| {
            let kind = p.kind.clone().unwrap_or_default();
            let cats = p
                .categories
                .iter()
                .take(2)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            let detail = if cats.is_empty() { kind.clone() } else { cats };
            AnswerItem {
                label: format!("{}: {detail}", title_case(&kind)),
                distance_mi: *distance,
                id: p.id.clone(),
                lat: Some(p.lat),
                lng: Some(p.lng),
                kind: p.kind.clone(),
                item_type: Some("pin".into()),
            }
        })
        .collect();

    let heading = match snapshot.kind {
        Some(PinKind::Offer) => "Offers",
        Some(PinKind::Need) => "Needs",
        None => "Pins",
    };
    let title = format!("{heading} nearby: {}", pins.len());
    ComposedAnswer {
        answer: bulleted_answer(&title, &items),
        subtitle: radius_subtitle(snapshot.radius_mi),
        items,
        title,
    }
}

fn compose_shelters(snapshot: &ContextSnapshot) -> ComposedAnswer {
    if snapshot.shelters.is_empty() {
        return empty_answer("No shelters found in this view.".to_owned());
    }
    let refs: Vec<_> = snapshot.shelters.iter().collect();
    let ranked = nearest(&refs, snapshot.center, |s| (s.lat, s.lng));
    let items: Vec<AnswerItem> = ranked
        .iter()
        .map(|(s, distance)| AnswerItem {
            label: s.name.clone().unwrap_or_else(|| "Shelter".into()),
            distance_mi: *distance,
            id: None,
            lat: Some(s.lat),
            lng: Some(s.lng),
            kind: None,
            item_type: Some("shelter".into()),
        })
        .collect();
    let title = format!("Shelters nearby: {}", snapshot.shelters.len());
    ComposedAnswer {
        answer: bulleted_answer(&title, &items),
        subtitle: radius_subtitle(snapshot.radius_mi),
        items,
        title,
    }
}

fn compose_food(snapshot: &ContextSnapshot) -> ComposedAnswer {
    if snapshot.food.is_empty() {
        return empty_answer("No food/supply sites found in this view.".to_owned());
    }
    let refs: Vec<_> = snapshot.food.iter().collect();
    let ranked = nearest(&refs, snapshot.center, |f| (f.lat, f.lng));
    let items: Vec<AnswerItem> = ranked
        .iter()
        .map(|(f, distance)| AnswerItem {
            label: f.name.clone().unwrap_or_else(|| "Food site".into()),
            distance_mi: *distance,
            id: None,
            lat: Some(f.lat),
            lng: Some(f.lng),
            kind: None,
            item_type: Some("food".into()),
        })
        .collect();
    let title = format!("Food/supply nearby: {}", snapshot.food.len());
    ComposedAnswer {
        answer: bulleted_answer(&title, &items),
        subtitle: radius_subtitle(snapshot.radius_mi),
        items,
        title,
    }
}

fn compose_feed311(snapshot: &ContextSnapshot) -> ComposedAnswer {
    if snapshot.feed311.is_empty() {
        return empty_answer("No 311 reports in this view.".to_owned());
    }

    // Top categories by frequency; ties break by first appearance.
    let mut frequencies: Vec<(String, usize)> = Vec::new();
    for report in &snapshot.feed311 {
        let category = report.category.clone().unwrap_or_else(|| "Other".into());
        match frequencies.iter_mut().find(|(c, _)| *c == category) {
            Some((_, n)) => *n += 1,
            None => frequencies.push((category, 1)),
        }
    }
    frequencies.sort_by(|a, b| b.1.cmp(&a.1));
    let top_categories = frequencies
        .iter()
        .take(3)
        .map(|(c, n)| format!("{c}:{n}"))
        .collect::<Vec<_>>()
        .join(", ");

    let refs: Vec<_> = snapshot.feed311.iter().collect();
    let ranked = nearest(&refs, snapshot.center, |r| (r.lat, r.lng));
    let items: Vec<AnswerItem> = ranked
        .iter()
        .map(|(r, distance)| AnswerItem {
            label: r.category.clone().unwrap_or_else(|| "311 report".into()),
            distance_mi: *distance,
            id: None,
            lat: Some(r.lat),
            lng: Some(r.lng),
            kind: None,
            item_type: Some("311".into()),
        })
        .collect();

    let count = snapshot.feed311.len();
    let title = format!("311 nearby: {count} reports");
    let subtitle = if top_categories.is_empty() {
        "Within view".to_owned()
    } else {
        format!("Top: {top_categories}")
    };
    let mut answer = format!("311 points: {count} (top: {top_categories}).");
    for line in bullet_lines(&items) {
        answer.push('\n');
        answer.push_str(&line);
    }
    ComposedAnswer {
        title,
        subtitle,
        items,
        answer,
    }
}

fn compose_summary(snapshot: &ContextSnapshot) -> ComposedAnswer {
    let counts = ResourceCounts {
        pins: snapshot.pins.len(),
        shelters: snapshot.shelters.len(),
        food: snapshot.food.len(),
        feed311: snapshot.feed311.len(),
    };
    ComposedAnswer {
        title: "Summary".into(),
        subtitle: "Visible resources".into(),
        items: vec![
            AnswerItem::labeled(format!("Pins: {}", counts.pins)),
            AnswerItem::labeled(format!("Shelters: {}", counts.shelters)),
            AnswerItem::labeled(format!("Food sites: {}", counts.food)),
            AnswerItem::labeled(format!("311: {}", counts.feed311)),
        ],
        answer: summary_sentence(counts),
    }
}

/// Rank by distance to `center` and keep the closest [`TOP_N`].
///
/// Items without a computable distance sort last, keeping their input
/// order (stable sort). With no center, the first [`TOP_N`] pass through
/// unranked.
fn nearest<'a, T>(
    items: &[&'a T],
    center: Option<LatLng>,
    location: impl Fn(&T) -> LatLng,
) -> Vec<(&'a T, Option<f64>)> {
    let Some(center) = center else {
        return items.iter().take(TOP_N).map(|it| (*it, None)).collect();
    };
    let mut ranked: Vec<(&T, Option<f64>)> = items
        .iter()
        .map(|it| (*it, geo::distance_mi(center, location(*it))))
        .collect();
    ranked.sort_by(|a, b| match (a.1, b.1) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    ranked.truncate(TOP_N);
    ranked
}

fn bullet_lines(items: &[AnswerItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| match item.distance_mi {
            Some(d) => format!("- {} · {d} mi", item.label),
            None => format!("- {}", item.label),
        })
        .collect()
}

fn bulleted_answer(title: &str, items: &[AnswerItem]) -> String {
    let mut answer = title.to_owned();
    for line in bullet_lines(items) {
        answer.push('\n');
        answer.push_str(&line);
    }
    answer
}

fn empty_answer(message: String) -> ComposedAnswer {
    let answer = format!("{message}{SUGGESTION}");
    ComposedAnswer {
        title: "No results".into(),
        subtitle: answer.clone(),
        items: Vec::new(),
        answer,
    }
}

fn radius_subtitle(radius_mi: Option<f64>) -> String {
    match radius_mi {
        Some(r) if r.fract() == 0.0 => format!("Within ~{} mi", r as i64),
        Some(r) => format!("Within ~{r} mi"),
        None => "Within view".to_owned(),
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduce::{FoodRecord, PinRecord, ReportRecord, ShelterRecord};
    use serde_json::json;

    const CENTER: LatLng = (29.7604, -95.3698);

    fn snapshot(intent: Intent) -> ContextSnapshot {
        ContextSnapshot {
            intent,
            center: Some(CENTER),
            radius_mi: Some(5.0),
            kind: None,
            pins: Vec::new(),
            shelters: Vec::new(),
            food: Vec::new(),
            feed311: Vec::new(),
        }
    }

    fn pin(id: &str, lat: f64, kind: &str, categories: &[&str]) -> PinRecord {
        PinRecord {
            id: Some(json!(id)),
            kind: Some(kind.into()),
            categories: categories.iter().map(|c| (*c).to_owned()).collect(),
            lat,
            lng: -95.3698,
            created_at: None,
        }
    }

    fn report(category: &str) -> ReportRecord {
        ReportRecord {
            lat: 29.76,
            lng: -95.37,
            category: Some(category.into()),
            updated: None,
        }
    }

    // ── Pins ─────────────────────────────────────────────────────────────

    #[test]
    fn empty_needs_snapshot_yields_fixed_message() {
        let mut snap = snapshot(Intent::Pins);
        snap.kind = Some(PinKind::Need);
        let out = compose(&snap);
        assert_eq!(out.title, "No results");
        assert!(out.items.is_empty());
        assert_eq!(
            out.answer,
            "No needs found in this view. Try zooming in or increasing the radius for more results."
        );
    }

    #[test]
    fn pins_rank_by_distance_and_keep_top_three() {
        let mut snap = snapshot(Intent::Pins);
        snap.pins = vec![
            pin("far", 29.80, "need", &[]),
            pin("near", 29.761, "need", &[]),
            pin("mid", 29.77, "need", &[]),
            pin("farther", 29.81, "need", &[]),
        ];
        let out = compose(&snap);
        assert_eq!(out.items.len(), 3);
        assert_eq!(out.items[0].id, Some(json!("near")));
        assert_eq!(out.items[1].id, Some(json!("mid")));
        assert_eq!(out.items[2].id, Some(json!("far")));
    }

    #[test]
    fn pin_label_uses_up_to_two_categories() {
        let mut snap = snapshot(Intent::Pins);
        snap.pins = vec![pin("a", 29.76, "need", &["Food", "Beds", "Medical"])];
        let out = compose(&snap);
        assert_eq!(out.items[0].label, "Need: Food, Beds");
    }

    #[test]
    fn pin_without_categories_labels_by_kind() {
        let mut snap = snapshot(Intent::Pins);
        snap.pins = vec![pin("a", 29.76, "offer", &[])];
        let out = compose(&snap);
        assert_eq!(out.items[0].label, "Offer: offer");
    }

    #[test]
    fn composer_refilters_kind_defensively() {
        let mut snap = snapshot(Intent::Pins);
        snap.kind = Some(PinKind::Offer);
        snap.pins = vec![pin("n", 29.76, "need", &[]), pin("o", 29.76, "offer", &[])];
        let out = compose(&snap);
        assert_eq!(out.title, "Offers nearby: 1");
        assert_eq!(out.items.len(), 1);
    }

    #[test]
    fn subtitle_reports_radius() {
        let mut snap = snapshot(Intent::Pins);
        snap.pins = vec![pin("a", 29.76, "need", &[])];
        let out = compose(&snap);
        assert_eq!(out.subtitle, "Within ~5 mi");
    }

    // ── Shelters / food ──────────────────────────────────────────────────

    #[test]
    fn unnamed_shelter_gets_generic_label() {
        let mut snap = snapshot(Intent::Shelters);
        snap.shelters = vec![ShelterRecord {
            name: None,
            lat: 29.76,
            lng: -95.37,
            capacity: None,
            shelter_type: None,
        }];
        let out = compose(&snap);
        assert_eq!(out.items[0].label, "Shelter");
        assert_eq!(out.title, "Shelters nearby: 1");
    }

    #[test]
    fn empty_food_snapshot_message() {
        let out = compose(&snapshot(Intent::Food));
        assert!(out.answer.starts_with("No food/supply sites found in this view."));
    }

    #[test]
    fn food_items_are_tagged() {
        let mut snap = snapshot(Intent::Food);
        snap.food = vec![FoodRecord {
            name: Some("Pantry A".into()),
            lat: 29.76,
            lng: -95.37,
            kind: Some("free_food".into()),
            status: None,
        }];
        let out = compose(&snap);
        assert_eq!(out.items[0].item_type.as_deref(), Some("food"));
        assert_eq!(out.items[0].label, "Pantry A");
    }

    // ── 311 ──────────────────────────────────────────────────────────────

    #[test]
    fn feed311_subtitle_ranks_categories_by_frequency() {
        let mut snap = snapshot(Intent::Feed311);
        snap.feed311 = vec![
            report("Pothole"),
            report("Flooding"),
            report("Pothole"),
            report("Pothole"),
        ];
        let out = compose(&snap);
        assert_eq!(out.subtitle, "Top: Pothole:3, Flooding:1");
        assert!(out.answer.starts_with("311 points: 4 (top: Pothole:3, Flooding:1)."));
    }

    #[test]
    fn feed311_frequency_ties_break_by_first_seen() {
        let mut snap = snapshot(Intent::Feed311);
        snap.feed311 = vec![report("Flooding"), report("Pothole")];
        let out = compose(&snap);
        assert_eq!(out.subtitle, "Top: Flooding:1, Pothole:1");
    }

    #[test]
    fn uncategorized_reports_count_as_other() {
        let mut snap = snapshot(Intent::Feed311);
        snap.feed311 = vec![ReportRecord {
            lat: 29.76,
            lng: -95.37,
            category: None,
            updated: None,
        }];
        let out = compose(&snap);
        assert_eq!(out.subtitle, "Top: Other:1");
    }

    // ── Summary ──────────────────────────────────────────────────────────

    #[test]
    fn summary_reports_counts_as_bullets_and_sentence() {
        let mut snap = snapshot(Intent::Summary);
        snap.pins = vec![pin("a", 29.76, "need", &[])];
        snap.feed311 = vec![report("Pothole")];
        let out = compose(&snap);
        assert_eq!(out.title, "Summary");
        assert_eq!(out.items.len(), 4);
        assert_eq!(out.answer, "In view: 1 pins, 0 shelters, 0 food sites, 1 311 points.");
    }

    #[test]
    fn flood_intent_composes_as_summary() {
        let out = compose(&snapshot(Intent::Flood));
        assert_eq!(out.title, "Summary");
        assert_eq!(out.answer, "In view: 0 pins, 0 shelters, 0 food sites, 0 311 points.");
    }

    // ── Clamping / ranking helpers ───────────────────────────────────────

    #[test]
    fn answer_is_clamped_to_700_chars() {
        let mut snap = snapshot(Intent::Shelters);
        snap.shelters = (0..3)
            .map(|i| ShelterRecord {
                name: Some(format!("{} {}", "Very Long Shelter Name".repeat(20), i)),
                lat: 29.76,
                lng: -95.37,
                capacity: None,
                shelter_type: None,
            })
            .collect();
        let out = compose(&snap);
        assert!(out.answer.chars().count() <= 700);
    }

    #[test]
    fn nearest_without_center_keeps_input_order() {
        let mut snap = snapshot(Intent::Pins);
        snap.center = None;
        snap.radius_mi = None;
        snap.pins = vec![pin("b", 29.80, "need", &[]), pin("a", 29.76, "need", &[])];
        let out = compose(&snap);
        assert_eq!(out.items[0].id, Some(json!("b")));
        assert!(out.items[0].distance_mi.is_none());
        assert_eq!(out.subtitle, "Within view");
    }
}
