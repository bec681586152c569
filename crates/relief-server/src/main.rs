//! Assist server binary — wires settings, the optional provider, and the
//! HTTP surface together.

#![deny(unsafe_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use relief_assist::AssistService;
use relief_llm::CompletionProvider;
use relief_llm::gemini::{GeminiConfig, GeminiProvider};
use relief_server::{AppState, metrics, router};
use relief_settings::AssistSettings;

/// Geospatial Q&A front-end for disaster-relief map data.
#[derive(Parser, Debug)]
#[command(name = "relief-server", about = "ReliefLink assist server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind.
    #[arg(long, default_value = "8787")]
    port: u16,

    /// Emit JSON log lines instead of human-readable ones.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    relief_core::logging::init(args.json_logs);

    let settings = AssistSettings::from_env();
    let provider: Option<Arc<dyn CompletionProvider>> = settings.api_key.clone().map(|api_key| {
        Arc::new(GeminiProvider::new(GeminiConfig {
            api_key,
            model: settings.model.clone(),
            base_url: None,
        })) as Arc<dyn CompletionProvider>
    });
    if provider.is_some() {
        info!(model = %settings.model, "language model provider configured");
    } else {
        info!("no provider key set, using the deterministic classifier only");
    }

    let handle = metrics::install_recorder()?;
    let state = AppState {
        assist: Arc::new(AssistService::new(&settings, provider)),
        metrics: handle,
    };

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, resource_base_url = %settings.resource_base_url, "assist server listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Resolve on ctrl-c.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
