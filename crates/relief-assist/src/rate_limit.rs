//! Per-client fixed-window rate limiting.
//!
//! One counter per `(client, operation)` pair. The window resets fully
//! (count → 1) once it elapses; exceeding the maximum leaves state
//! unchanged. Whole Q&A requests use a 1-event window per client, which
//! makes this a soft cooldown rather than a hard failure.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Fixed-window limiter over `(client, operation)` keys.
pub struct RateLimiter {
    max_events: u32,
    window: Duration,
    buckets: Mutex<HashMap<String, Bucket>>,
}

#[derive(Clone, Copy)]
struct Bucket {
    window_start: DateTime<Utc>,
    count: u32,
}

impl RateLimiter {
    /// Allow at most `max_events` per `window_secs` per key.
    #[must_use]
    pub fn new(max_events: u32, window_secs: u64) -> Self {
        Self {
            max_events,
            window: Duration::seconds(window_secs as i64),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Record an event against the wall clock; false means throttled.
    pub fn allow(&self, client_id: &str, operation: &str) -> bool {
        self.allow_at(client_id, operation, Utc::now())
    }

    /// Record an event as of `now`; false means throttled and no state
    /// change.
    pub fn allow_at(&self, client_id: &str, operation: &str, now: DateTime<Utc>) -> bool {
        let key = bucket_key(client_id, operation);
        let mut buckets = self.buckets.lock();
        match buckets.get_mut(&key) {
            Some(bucket) if now - bucket.window_start <= self.window => {
                if bucket.count >= self.max_events {
                    return false;
                }
                bucket.count += 1;
                true
            }
            _ => {
                let _ = buckets.insert(
                    key,
                    Bucket {
                        window_start: now,
                        count: 1,
                    },
                );
                true
            }
        }
    }

    /// Whole seconds until the key's window elapses, against the wall clock.
    pub fn retry_after_secs(&self, client_id: &str, operation: &str) -> u64 {
        self.retry_after_secs_at(client_id, operation, Utc::now())
    }

    /// Whole seconds until the key's window elapses, for throttle messages.
    ///
    /// Zero when the key has no active window.
    pub fn retry_after_secs_at(
        &self,
        client_id: &str,
        operation: &str,
        now: DateTime<Utc>,
    ) -> u64 {
        let buckets = self.buckets.lock();
        buckets
            .get(&bucket_key(client_id, operation))
            .map(|bucket| {
                let remaining = self.window - (now - bucket.window_start);
                remaining.num_seconds().max(0) as u64
            })
            .unwrap_or(0)
    }
}

fn bucket_key(client_id: &str, operation: &str) -> String {
    format!("{client_id}\u{1f}{operation}")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_event_is_allowed() {
        let limiter = RateLimiter::new(1, 8);
        assert!(limiter.allow_at("1.2.3.4", "qna", Utc::now()));
    }

    #[test]
    fn second_event_in_window_is_throttled() {
        let limiter = RateLimiter::new(1, 8);
        let t0 = Utc::now();
        assert!(limiter.allow_at("c", "qna", t0));
        assert!(!limiter.allow_at("c", "qna", t0 + Duration::seconds(3)));
    }

    #[test]
    fn window_elapse_resets_the_count() {
        let limiter = RateLimiter::new(1, 8);
        let t0 = Utc::now();
        assert!(limiter.allow_at("c", "qna", t0));
        assert!(limiter.allow_at("c", "qna", t0 + Duration::seconds(9)));
    }

    #[test]
    fn throttled_event_leaves_state_unchanged() {
        let limiter = RateLimiter::new(2, 10);
        let t0 = Utc::now();
        assert!(limiter.allow_at("c", "qna", t0));
        assert!(limiter.allow_at("c", "qna", t0 + Duration::seconds(1)));
        assert!(!limiter.allow_at("c", "qna", t0 + Duration::seconds(2)));
        // Still throttled — the denied event did not extend the window.
        assert!(!limiter.allow_at("c", "qna", t0 + Duration::seconds(9)));
        assert!(limiter.allow_at("c", "qna", t0 + Duration::seconds(11)));
    }

    #[test]
    fn clients_are_independent() {
        let limiter = RateLimiter::new(1, 8);
        let t0 = Utc::now();
        assert!(limiter.allow_at("a", "qna", t0));
        assert!(limiter.allow_at("b", "qna", t0));
    }

    #[test]
    fn operations_are_independent() {
        let limiter = RateLimiter::new(1, 8);
        let t0 = Utc::now();
        assert!(limiter.allow_at("c", "qna", t0));
        assert!(limiter.allow_at("c", "classify", t0));
    }

    #[test]
    fn retry_after_counts_down() {
        let limiter = RateLimiter::new(1, 8);
        let t0 = Utc::now();
        assert!(limiter.allow_at("c", "qna", t0));
        assert_eq!(limiter.retry_after_secs_at("c", "qna", t0 + Duration::seconds(3)), 5);
    }

    #[test]
    fn retry_after_zero_without_bucket() {
        let limiter = RateLimiter::new(1, 8);
        assert_eq!(limiter.retry_after_secs_at("c", "qna", Utc::now()), 0);
    }
}
