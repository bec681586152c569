//! # relief-server
//!
//! Axum HTTP surface for the assist service.
//!
//! Four routes: `POST /assist-query` (the Q&A pipeline), `GET /assist-status`
//! (provider/breaker diagnostics), `GET /healthz`, and `GET /metrics`
//! (Prometheus text). Every query response is `200 OK` — degraded outcomes
//! are encoded in the body, not the status line.

#![deny(unsafe_code)]

pub mod metrics;
pub mod routes;

pub use routes::{AppState, router};
