//! Swap Orchestrator - cross-chain token swap coordination
//!
//! Quotes swap requests, waits for the user's decision, and drives the
//! wrap/transfer/swap/unwrap pipeline against a bridging provider with
//! bounded retry and compensation.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

mod api;
mod bridge;
mod config;
mod error;
mod events;
mod metrics;
mod orchestrator;
mod quote;
mod state;
mod steps;
mod swap;

use bridge::SimulatedBridge;
use config::Settings;
use metrics::MetricsServer;
use orchestrator::SwapOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Swap Orchestrator v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for instance {}",
        settings.orchestrator.instance_id
    );

    if !settings.bridge.failures.is_empty() {
        warn!(
            "Simulated bridge will inject {} failure rule(s)",
            settings.bridge.failures.len()
        );
    }
    let bridge = Arc::new(SimulatedBridge::new(settings.bridge.clone()));

    // Initialize orchestrator
    let orchestrator = Arc::new(SwapOrchestrator::new(
        settings.orchestrator.clone(),
        bridge,
    ));

    // Initialize metrics server
    let metrics_server = if settings.metrics.enabled {
        Some(MetricsServer::new(settings.metrics.port))
    } else {
        None
    };

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let orchestrator = orchestrator.clone();
        async move {
            if let Err(e) = api::run_server(config, orchestrator).await {
                error!("API server error: {:#}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = metrics_server.map(|server| {
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {:#}", e);
            }
        })
    });

    // Start orchestrator maintenance loop
    let engine_handle = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move {
            if let Err(e) = orchestrator.run().await {
                error!("Orchestrator error: {}", e);
            }
        }
    });

    info!("Swap Orchestrator is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // Graceful shutdown
    orchestrator.stop();
    if let Err(e) = engine_handle.await {
        warn!("Orchestrator task ended abnormally: {}", e);
    }

    let running = orchestrator.active_instances();
    if running > 0 {
        warn!("{} swap(s) still running at shutdown", running);
    }

    // Abort background tasks
    api_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Swap Orchestrator stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,swap_orchestrator=debug,hyper=warn"));

    let json = std::env::var("SWAP_ORCHESTRATOR_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
