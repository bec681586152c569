//! Circuit breaker around the language model provider.
//!
//! Only quota/rate-limit failures trip the cooldown: they are the one
//! failure mode likely to repeat on every subsequent call. Transient
//! failures degrade the single request without tripping anything. The
//! breaker resets implicitly once the cooldown timestamp passes.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::warn;

/// Classified provider failure, from the breaker's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Quota exhaustion or rate limiting — trips the cooldown.
    Quota,
    /// Anything else — assumed transient or local.
    Transient,
}

/// Process-wide breaker state for the provider.
pub struct CircuitBreaker {
    cooldown: Duration,
    configured: bool,
    disabled: bool,
    cooldown_until: Mutex<Option<DateTime<Utc>>>,
}

impl CircuitBreaker {
    /// Create a breaker.
    ///
    /// `configured` is whether the provider has credentials at all;
    /// `disabled` is the administrative kill switch. Either being false
    /// makes [`healthy_at`](Self::healthy_at) permanently false.
    #[must_use]
    pub fn new(cooldown_secs: u64, configured: bool, disabled: bool) -> Self {
        Self {
            cooldown: Duration::seconds(cooldown_secs as i64),
            configured,
            disabled,
            cooldown_until: Mutex::new(None),
        }
    }

    /// Whether the provider should be called right now.
    pub fn healthy(&self) -> bool {
        self.healthy_at(Utc::now())
    }

    /// Whether the provider should be called as of `now`.
    pub fn healthy_at(&self, now: DateTime<Utc>) -> bool {
        self.configured && !self.disabled && !self.cooling_down_at(now)
    }

    /// Whether a cooldown is active as of `now`.
    pub fn cooling_down_at(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.lock().is_some_and(|until| now < until)
    }

    /// Record a provider failure against the wall clock.
    pub fn report_failure(&self, kind: FailureKind) {
        self.report_failure_at(kind, Utc::now());
    }

    /// Record a provider failure as of `now`.
    pub fn report_failure_at(&self, kind: FailureKind, now: DateTime<Utc>) {
        if kind == FailureKind::Quota {
            let until = now + self.cooldown;
            *self.cooldown_until.lock() = Some(until);
            warn!(cooldown_until = %until, "provider quota failure, suppressing calls");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
