//! # relief-assist
//!
//! The query-orchestration core behind `POST /assist-query`.
//!
//! A free-text question plus an optional map viewport flows through:
//! rate limit → answer cache → classification cache → intent classifier
//! (provider-backed with a deterministic fallback, guarded by a circuit
//! breaker) → context fetch → geospatial/temporal reduction → template
//! composition → answer cache. Any failure after the rate-limit stage
//! degrades to a deterministic summary; there is no fatal path.
//!
//! - [`orchestrator::AssistService`] — the end-to-end state machine
//! - [`classifier::IntentClassifier`] — provider + keyword fallback
//! - [`cache::TtlCache`] / [`rate_limit::RateLimiter`] /
//!   [`breaker::CircuitBreaker`] — in-process soft-fail accelerators
//! - [`fetch::ResourceClient`] — the four Resource Store reads
//! - [`reduce`] / [`compose`] — pure snapshot reduction and rendering
//!
//! All stateful components are explicitly constructed and injectable, and
//! expose `*_at` variants taking a `now` so tests control simulated time.

#![deny(unsafe_code)]

pub mod breaker;
pub mod cache;
pub mod classifier;
pub mod compose;
pub mod fetch;
pub mod orchestrator;
pub mod rate_limit;
pub mod reduce;
pub mod types;

pub use orchestrator::{AssistService, StatusReport};
pub use types::{AssistResponse, Classification, Filters, Intent, PinKind, Query};
