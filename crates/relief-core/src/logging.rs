//! Tracing subscriber initialization for the server binary.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG` when set, otherwise `info` for relief
/// crates and `warn` for everything else. `json` switches the output to
/// newline-delimited JSON for log shippers.
///
/// Idempotent: a second call is a no-op rather than a panic, so tests
/// that initialize logging can run in one process.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,relief_core=info,relief_settings=info,relief_llm=info,relief_assist=info,relief_server=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
