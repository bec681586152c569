//! Intent-scoped context reduction.
//!
//! Turns the raw collections into a bounded snapshot: cap each collection
//! first (cost bound), project to normalized records, clip to the viewport,
//! then apply the intent's filters. An intent only populates the
//! collections it needs; `summary` populates all four, `flood` and `other`
//! none (their answers are count-only or reference-layer driven).

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use relief_core::geo::{self, LatLng};

use crate::fetch::RawContext;
use crate::types::{Intent, PinKind};

/// Raw-item cap for pins, shelters, and food sites.
pub const COLLECTION_CAP: usize = 200;

/// Raw-feature cap for 311 reports.
pub const REPORT_CAP: usize = 150;

/// Normalized community pin.
#[derive(Debug, Clone, Serialize)]
pub struct PinRecord {
    /// Source id, passed through untouched.
    pub id: Option<Value>,
    /// `need` or `offer`.
    pub kind: Option<String>,
    /// Pin categories.
    pub categories: Vec<String>,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Creation timestamp, passed through untouched.
    pub created_at: Option<String>,
}

/// Normalized shelter.
#[derive(Debug, Clone, Serialize)]
pub struct ShelterRecord {
    /// Facility name.
    pub name: Option<String>,
    /// Latitude (WGS84, after coordinate normalization).
    pub lat: f64,
    /// Longitude (WGS84, after coordinate normalization).
    pub lng: f64,
    /// Capacity, shape varies by feed.
    pub capacity: Option<Value>,
    /// Shelter type tag.
    #[serde(rename = "type")]
    pub shelter_type: Option<String>,
}

/// Normalized food/supply site.
#[derive(Debug, Clone, Serialize)]
pub struct FoodRecord {
    /// Site name.
    pub name: Option<String>,
    /// Latitude (WGS84, after coordinate normalization).
    pub lat: f64,
    /// Longitude (WGS84, after coordinate normalization).
    pub lng: f64,
    /// `free_food` or `drop_off`.
    pub kind: Option<String>,
    /// Open/closed status.
    pub status: Option<String>,
}

/// Flattened 311 report, projected from a GeoJSON Point feature.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRecord {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Report category.
    pub category: Option<String>,
    /// Last-update timestamp, epoch milliseconds or string.
    pub updated: Option<Value>,
}

/// Reduction parameters resolved from classification and the query.
#[derive(Debug, Clone)]
pub struct ReduceParams {
    /// Resolved intent.
    pub intent: Intent,
    /// Viewport center; `None` disables clipping.
    pub center: Option<LatLng>,
    /// Viewport radius in miles; `None` disables clipping.
    pub radius_mi: Option<f64>,
    /// Pin kind filter.
    pub kind: Option<PinKind>,
    /// Pin category filter.
    pub categories: Option<Vec<String>>,
    /// Report recency horizon, hours.
    pub time_window_hours: Option<f64>,
}

impl ReduceParams {
    /// Summary parameters for the fallback path: viewport only.
    #[must_use]
    pub fn summary(center: Option<LatLng>, radius_mi: Option<f64>) -> Self {
        Self {
            intent: Intent::Summary,
            center,
            radius_mi,
            kind: None,
            categories: None,
            time_window_hours: None,
        }
    }
}

/// Bounded, intent-scoped view of the raw collections.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSnapshot {
    /// Resolved intent.
    pub intent: Intent,
    /// Viewport center.
    pub center: Option<LatLng>,
    /// Viewport radius in miles.
    pub radius_mi: Option<f64>,
    /// Pin kind filter that was applied.
    pub kind: Option<PinKind>,
    /// Pins in scope.
    pub pins: Vec<PinRecord>,
    /// Shelters in scope.
    pub shelters: Vec<ShelterRecord>,
    /// Food/supply sites in scope.
    pub food: Vec<FoodRecord>,
    /// 311 reports in scope.
    pub feed311: Vec<ReportRecord>,
}

/// Reduce against the wall clock (report recency filter).
pub fn reduce(raw: &RawContext, params: &ReduceParams) -> ContextSnapshot {
    reduce_at(raw, params, Utc::now().timestamp_millis())
}

/// Reduce as of `now_ms` epoch milliseconds.
pub fn reduce_at(raw: &RawContext, params: &ReduceParams, now_ms: i64) -> ContextSnapshot {
    let mut snapshot = ContextSnapshot {
        intent: params.intent,
        center: params.center,
        radius_mi: params.radius_mi,
        kind: params.kind,
        pins: Vec::new(),
        shelters: Vec::new(),
        food: Vec::new(),
        feed311: Vec::new(),
    };

    if wants(params.intent, Intent::Pins) {
        let mut pins: Vec<PinRecord> = raw
            .pins
            .iter()
            .take(COLLECTION_CAP)
            .filter_map(project_pin)
            .collect();
        pins = clip(pins, params, |p| (p.lat, p.lng));
        if let Some(kind) = params.kind {
            pins.retain(|p| p.kind.as_deref() == Some(kind.as_str()));
        }
        if let Some(categories) = &params.categories {
            let wanted: Vec<String> = categories.iter().map(|c| c.to_lowercase()).collect();
            pins.retain(|p| {
                p.categories
                    .iter()
                    .any(|c| wanted.iter().any(|w| w == &c.to_lowercase()))
            });
        }
        snapshot.pins = pins;
    }

    if wants(params.intent, Intent::Shelters) {
        let shelters: Vec<ShelterRecord> = raw
            .shelters
            .iter()
            .take(COLLECTION_CAP)
            .filter_map(project_shelter)
            .collect();
        snapshot.shelters = clip(shelters, params, |s| (s.lat, s.lng));
    }

    if wants(params.intent, Intent::Food) {
        let food: Vec<FoodRecord> = raw
            .food
            .iter()
            .take(COLLECTION_CAP)
            .filter_map(project_food)
            .collect();
        snapshot.food = clip(food, params, |f| (f.lat, f.lng));
    }

    if wants(params.intent, Intent::Feed311) {
        let features = raw
            .feed311
            .get("features")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let reports: Vec<ReportRecord> = features
            .iter()
            .take(REPORT_CAP)
            .filter_map(project_report)
            .collect();
        let mut reports = clip(reports, params, |r| (r.lat, r.lng));
        if let Some(window_hours) = params.time_window_hours {
            let horizon_ms = (window_hours * 3_600_000.0) as i64;
            // Unparsable timestamps are kept: better a stale report than a
            // silently shrinking feed.
            reports.retain(|r| match updated_ms(r.updated.as_ref()) {
                Some(ts) => now_ms - ts <= horizon_ms,
                None => true,
            });
        }
        snapshot.feed311 = reports;
    }

    snapshot
}

/// Whether `intent` populates `collection`'s intent.
fn wants(intent: Intent, collection: Intent) -> bool {
    intent == collection || intent == Intent::Summary
}

fn clip<T>(items: Vec<T>, params: &ReduceParams, location: impl Fn(&T) -> LatLng) -> Vec<T> {
    match (params.center, params.radius_mi) {
        (Some(center), Some(radius)) => {
            geo::clip_by_radius(items, center, radius, |it| Some(location(it)))
        }
        _ => items,
    }
}

fn project_pin(value: &Value) -> Option<PinRecord> {
    Some(PinRecord {
        id: value.get("id").cloned(),
        kind: str_field(value, "kind"),
        categories: value
            .get("categories")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| c.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default(),
        lat: f64_field(value, "lat")?,
        lng: f64_field(value, "lng")?,
        created_at: str_field(value, "created_at"),
    })
}

fn project_shelter(value: &Value) -> Option<ShelterRecord> {
    let (lat, lng) = geo::wgs84_from_any(f64_field(value, "lat")?, f64_field(value, "lng")?);
    Some(ShelterRecord {
        name: str_field(value, "name"),
        lat,
        lng,
        capacity: value.get("capacity").filter(|v| !v.is_null()).cloned(),
        shelter_type: str_field(value, "type"),
    })
}

fn project_food(value: &Value) -> Option<FoodRecord> {
    let (lat, lng) = geo::wgs84_from_any(f64_field(value, "lat")?, f64_field(value, "lng")?);
    Some(FoodRecord {
        name: str_field(value, "name"),
        lat,
        lng,
        kind: str_field(value, "kind"),
        status: str_field(value, "status"),
    })
}

/// Project a GeoJSON feature; non-Point geometries are dropped.
fn project_report(feature: &Value) -> Option<ReportRecord> {
    let geometry = feature.get("geometry")?;
    if geometry.get("type").and_then(Value::as_str) != Some("Point") {
        return None;
    }
    let coordinates = geometry.get("coordinates").and_then(Value::as_array)?;
    // GeoJSON order is [lng, lat].
    let lng = coordinates.first().and_then(Value::as_f64)?;
    let lat = coordinates.get(1).and_then(Value::as_f64)?;
    let props = feature.get("properties");
    Some(ReportRecord {
        lat,
        lng,
        category: props.and_then(|p| p.get("category")).and_then(Value::as_str).map(str::to_owned),
        updated: props.and_then(|p| p.get("updated")).filter(|v| !v.is_null()).cloned(),
    })
}

fn f64_field(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64).filter(|v| v.is_finite())
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Epoch milliseconds from an `updated` property, tolerating numeric or
/// numeric-string forms.
fn updated_ms(updated: Option<&Value>) -> Option<i64> {
    match updated? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
