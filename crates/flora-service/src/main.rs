//! Flora Service - Background collector and HTTP status API.
//!
//! Run with: `cargo run -p flora-service`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use flora_core::{BleTransport, FloraTransport};
use flora_service::{AppState, Collector, Config, api, build_pollers};

/// Flora Service - Background collector and HTTP status API.
#[derive(Parser, Debug)]
#[command(name = "flora-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Disable the HTTP API (collector only mode).
    #[arg(long)]
    no_api: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("flora_service=info,flora_core=info")
            }),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    // Override config with CLI args
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if args.no_api {
        config.server.enabled = false;
    }
    config.validate()?;

    let host = hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "flora".to_string());

    let transport: Arc<dyn FloraTransport> = Arc::new(
        BleTransport::new()
            .await
            .context("Failed to open Bluetooth adapter")?,
    );
    let pollers = build_pollers(&config, transport, &host);
    let state = AppState::new(config.clone(), pollers);

    let mut collector = Collector::new(Arc::clone(&state));
    collector.start();

    let shutdown = collector.cancel_token();
    tokio::spawn(wait_for_ctrl_c(shutdown.clone()));

    if config.server.enabled {
        let app = Router::new()
            .merge(api::router())
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(&config.server.bind)
            .await
            .with_context(|| format!("Failed to bind {}", config.server.bind))?;
        info!("Starting server on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .await?;
    } else {
        info!("HTTP API disabled");
        shutdown.cancelled().await;
    }

    info!("Shutting down...");
    collector.stop().await;

    Ok(())
}

async fn wait_for_ctrl_c(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    shutdown.cancel();
}
