//! Route table and handlers.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::request::Parts;
use axum::response::Json;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use relief_assist::{AssistResponse, AssistService, Query, StatusReport};

/// Shared state accessible from handlers.
#[derive(Clone)]
pub struct AppState {
    /// The query orchestrator.
    pub assist: Arc<AssistService>,
    /// Handle for rendering `/metrics`.
    pub metrics: PrometheusHandle,
}

/// Upper bound on a whole request, including the slowest store fetch.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the router with all routes.
///
/// CORS is permissive: the caller is a public browser map client.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/assist-query", post(assist_query))
        .route("/assist-status", get(assist_status))
        .route("/healthz", get(healthz))
        .route("/metrics", get(render_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

/// Client identity for rate limiting.
///
/// First hop of `x-forwarded-for` when present (the service normally sits
/// behind a reverse proxy), else the peer address, else a shared
/// `"unknown"` bucket.
pub struct ClientId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Infallible> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty());
        let id = forwarded.unwrap_or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map_or_else(|| "unknown".to_owned(), |info| info.0.ip().to_string())
        });
        Ok(Self(id))
    }
}

/// POST /assist-query
async fn assist_query(
    State(state): State<AppState>,
    ClientId(client): ClientId,
    Json(query): Json<Query>,
) -> Json<AssistResponse> {
    debug!(client = %client, "assist query received");
    Json(state.assist.answer(&client, &query).await)
}

/// GET /assist-status
async fn assist_status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.assist.status())
}

/// GET /healthz
async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// GET /metrics
async fn render_metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
