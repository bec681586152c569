//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Must be called once at startup, before any counters are touched.
/// Returns the handle used to render the `/metrics` endpoint.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Build a recorder without installing it globally.
///
/// Tests use this so parallel test binaries don't race on the global
/// recorder slot.
#[must_use]
pub fn test_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
