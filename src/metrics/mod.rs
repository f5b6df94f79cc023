//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Swap lifecycle (started, terminal status, active)
//! - Stage latency and failures
//! - Retries and compensations

use crate::swap::{StepType, SwapStatus};

use anyhow::{Context, Result};
use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref SWAPS_STARTED: CounterVec = register_counter_vec!(
        "swap_orchestrator_swaps_started_total",
        "Total swaps started",
        &[]
    ).unwrap();

    pub static ref SWAPS_TERMINAL: CounterVec = register_counter_vec!(
        "swap_orchestrator_swaps_terminal_total",
        "Total swaps reaching a terminal status",
        &["status"]
    ).unwrap();

    pub static ref ACTIVE_SWAPS: Gauge = register_gauge!(
        "swap_orchestrator_active_swaps",
        "Swaps with a running workflow"
    ).unwrap();

    // Stage metrics
    pub static ref STAGE_DURATION: HistogramVec = register_histogram_vec!(
        "swap_orchestrator_stage_duration_seconds",
        "Pipeline stage latency including retries",
        &["stage"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0]
    ).unwrap();

    pub static ref STAGE_FAILURES: CounterVec = register_counter_vec!(
        "swap_orchestrator_stage_failures_total",
        "Pipeline stages that exhausted their retries",
        &["stage"]
    ).unwrap();

    pub static ref ACTIVITY_RETRIES: CounterVec = register_counter_vec!(
        "swap_orchestrator_activity_retries_total",
        "Bridge calls retried after a transient failure",
        &["operation"]
    ).unwrap();

    pub static ref COMPENSATIONS: CounterVec = register_counter_vec!(
        "swap_orchestrator_compensations_total",
        "Compensating unwraps by outcome",
        &["outcome"]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> Result<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind metrics server on {}", addr))?;
        axum::serve(listener, app)
            .await
            .context("Metrics server failed")?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    render().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Text exposition of every registered metric
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

// Helper functions to record metrics

pub fn record_swap_started() {
    SWAPS_STARTED.with_label_values(&[]).inc();
    ACTIVE_SWAPS.inc();
}

pub fn record_swap_terminal(status: SwapStatus) {
    SWAPS_TERMINAL.with_label_values(&[status.as_str()]).inc();
    ACTIVE_SWAPS.dec();
}

pub fn record_stage_duration(stage: StepType, latency_secs: f64) {
    STAGE_DURATION
        .with_label_values(&[stage.as_str()])
        .observe(latency_secs);
}

pub fn record_stage_failure(stage: StepType) {
    STAGE_FAILURES.with_label_values(&[stage.as_str()]).inc();
}

pub fn record_activity_retry(operation: &str) {
    ACTIVITY_RETRIES.with_label_values(&[operation]).inc();
}

pub fn record_compensation(succeeded: bool) {
    COMPENSATIONS
        .with_label_values(&[if succeeded { "succeeded" } else { "failed" }])
        .inc();
}
