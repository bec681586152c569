//! TTL key/value cache and request fingerprinting.
//!
//! Keys merge near-duplicate queries on purpose: the question is
//! whitespace-collapsed and lowercased, the center rounded to 2 decimal
//! places (~1.1 km) and the radius to 1, so float noise and casing map to
//! one entry. Expired entries are evicted lazily on the next lookup.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

/// In-process TTL cache. Values are cloned out on hit.
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (DateTime<Utc>, V)>>,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache whose entries live for `ttl_secs` seconds.
    #[must_use]
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs as i64),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up `key` against the wall clock.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    /// Look up `key` as of `now`; evicts the entry if it has expired.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((stored_at, value)) if now - *stored_at <= self.ttl => Some(value.clone()),
            Some(_) => {
                let _ = entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `value` under `key` at the wall clock.
    pub fn insert(&self, key: &str, value: V) {
        self.insert_at(key, value, Utc::now());
    }

    /// Store `value` under `key` stamped `now`.
    pub fn insert_at(&self, key: &str, value: V, now: DateTime<Utc>) {
        let _ = self.entries.lock().insert(key.to_owned(), (now, value));
    }
}

/// Fingerprint for the full-answer cache.
pub fn answer_key(question: &str, center: Option<[f64; 2]>, radius_mi: Option<f64>) -> String {
    fingerprint(false, question, center, radius_mi)
}

/// Fingerprint for the classification-only cache.
///
/// Same normalized tuple, tagged so repeated questions skip the provider
/// call even when the final answer entry has expired.
pub fn classification_key(
    question: &str,
    center: Option<[f64; 2]>,
    radius_mi: Option<f64>,
) -> String {
    fingerprint(true, question, center, radius_mi)
}

fn fingerprint(
    classification: bool,
    question: &str,
    center: Option<[f64; 2]>,
    radius_mi: Option<f64>,
) -> String {
    let q = normalize_question(question);
    let c = center.map(|[lat, lng]| [round_to(lat, 2), round_to(lng, 2)]);
    let r = round_to(radius_mi.unwrap_or(crate::types::DEFAULT_RADIUS_MI), 1);
    let tuple = serde_json::json!({
        "clf": classification,
        "q": q,
        "c": c,
        "r": r,
    });
    let digest = Sha256::digest(tuple.to_string().as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Trim, lowercase, and collapse runs of whitespace to single spaces.
fn normalize_question(question: &str) -> String {
    question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
