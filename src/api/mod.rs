//! HTTP API for swaps, quotes, health and statistics

use crate::config::ApiConfig;
use crate::error::OrchestratorError;
use crate::orchestrator::{CancelOutcome, SwapOrchestrator};
use crate::state::SwapStats;
use crate::swap::{SwapRequest, SwapStatus};

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SwapOrchestrator>,
}

/// Build the API router
pub fn router(orchestrator: Arc<SwapOrchestrator>) -> Router {
    let state = AppState { orchestrator };

    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/quote", post(quote))
        .route("/swaps", post(start_swap))
        .route("/swaps/:id", get(get_swap))
        .route("/swaps/:id/journal", get(get_journal))
        .route("/swaps/:id/confirm", post(confirm_swap))
        .route("/swaps/:id/cancel", post(cancel_swap))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, orchestrator: Arc<SwapOrchestrator>) -> anyhow::Result<()> {
    let app = router(orchestrator);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server on {}", addr))?;
    axum::serve(listener, app)
        .await
        .context("API server failed")?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_swaps: state.orchestrator.active_instances(),
    })
}

/// Swap counts per lifecycle status
async fn get_stats(State(state): State<AppState>) -> Json<SwapStats> {
    Json(state.orchestrator.stats())
}

async fn quote(
    State(state): State<AppState>,
    Json(request): Json<SwapRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let quote = state.orchestrator.quote(&request).await?;
    Ok(Json(quote))
}

async fn start_swap(
    State(state): State<AppState>,
    Json(request): Json<SwapRequest>,
) -> impl IntoResponse {
    let request_id = state.orchestrator.start_swap(request);
    (StatusCode::ACCEPTED, Json(StartResponse { request_id }))
}

async fn get_swap(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.get_status(&id)?))
}

/// Original request and the append-only event journal
async fn get_journal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.history(&id)?))
}

async fn confirm_swap(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.orchestrator.confirm(&id).await?;
    Ok(Json(SignalResponse {
        applied: outcome.applied,
        status: outcome.status,
    }))
}

async fn cancel_swap(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let response = match state.orchestrator.cancel(&id).await? {
        CancelOutcome::Applied { status } => SignalResponse {
            applied: true,
            status,
        },
        CancelOutcome::NotApplied { status } => SignalResponse {
            applied: false,
            status,
        },
    };
    Ok(Json(response))
}

/// Orchestrator errors rendered as JSON with a matching status code
pub struct ApiError(OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrchestratorError::NotFound { .. } => StatusCode::NOT_FOUND,
            err if err.is_client_error() => StatusCode::BAD_REQUEST,
            err if err.is_retryable() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: self.0.code(),
            }),
        )
            .into_response()
    }
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    active_swaps: usize,
}

#[derive(Serialize)]
struct StartResponse {
    request_id: String,
}

#[derive(Serialize)]
struct SignalResponse {
    applied: bool,
    status: SwapStatus,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeOperation, SimulatedBridge};
    use crate::config::{
        BridgeConfig, FailureInjection, FailureKind, OrchestratorConfig, RetryConfig,
    };
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(bridge: BridgeConfig) -> Router {
        let config = OrchestratorConfig {
            confirmation_timeout_ms: 5_000,
            retry: RetryConfig {
                initial_interval_ms: 1,
                backoff_coefficient: 2.0,
                max_interval_ms: 5,
                max_attempts: 2,
            },
            ..OrchestratorConfig::default()
        };
        let orchestrator = SwapOrchestrator::new(config, Arc::new(SimulatedBridge::new(bridge)));
        router(Arc::new(orchestrator))
    }

    fn swap_body(id: &str, amount: &str) -> Value {
        json!({
            "request_id": id,
            "source_token": {
                "symbol": "ETH", "name": "Ether", "decimals": 18,
                "address": "0xeth", "chain_id": 1, "chain_name": "ethereum"
            },
            "dest_token": {
                "symbol": "USDC", "name": "USD Coin", "decimals": 6,
                "address": "0xusdc", "chain_id": 137, "chain_name": "polygon"
            },
            "amount": amount,
            "source_address": "0xsource",
            "dest_address": "0xdest",
            "slippage": 0.5
        })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(BridgeConfig::default());
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_quote_returns_decimal_strings() {
        let app = app(BridgeConfig::default());
        let (status, body) = send(
            &app,
            "POST",
            "/quote",
            Some(swap_body("q", "1000000000000000000")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["input_amount"], "1000000000000000000");
        assert!(body["output_amount"].is_string());
        assert_eq!(body["path"], json!(["ETH", "uETH", "uUSDC", "USDC"]));
    }

    #[tokio::test]
    async fn test_quote_validation_is_bad_request() {
        let app = app(BridgeConfig::default());
        let (status, body) = send(&app, "POST", "/quote", Some(swap_body("q", "0"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_amount");
    }

    #[tokio::test]
    async fn test_quote_dependency_failure_is_bad_gateway() {
        let app = app(BridgeConfig {
            failures: vec![FailureInjection {
                operation: BridgeOperation::FeeEstimate,
                times: None,
                kind: FailureKind::Unavailable,
                message: "oracle down".into(),
            }],
            ..BridgeConfig::default()
        });

        let (status, body) = send(
            &app,
            "POST",
            "/quote",
            Some(swap_body("q", "1000000000000000000")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "fee_estimate_failed");
    }

    #[tokio::test]
    async fn test_unknown_swap_is_not_found() {
        let app = app(BridgeConfig::default());
        let (status, body) = send(&app, "GET", "/swaps/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");

        let (status, _) = send(&app, "POST", "/swaps/missing/cancel", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "GET", "/swaps/missing/journal", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_swap_lifecycle_over_http() {
        let app = app(BridgeConfig::default());

        let (status, body) = send(
            &app,
            "POST",
            "/swaps",
            Some(swap_body("http-1", "1000000000000000000")),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["request_id"], "http-1");

        let (status, body) = send(&app, "POST", "/swaps/http-1/confirm", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"applied": true, "status": "confirmed"}));

        let mut last = Value::Null;
        for _ in 0..500 {
            let (_, body) = send(&app, "GET", "/swaps/http-1", None).await;
            if body["state"] == "completed" {
                last = body;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(last["status"], "succeeded");
        assert_eq!(last["transactions"].as_array().map(Vec::len), Some(4));
        assert_eq!(last["transactions"][0]["type"], "wrap");

        let (status, body) = send(&app, "POST", "/swaps/http-1/cancel", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"applied": false, "status": "succeeded"}));

        let (_, stats) = send(&app, "GET", "/stats", None).await;
        assert_eq!(stats["succeeded"], 1);

        let (status, history) = send(&app, "GET", "/swaps/http-1/journal", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["request"]["amount"], "1000000000000000000");
        assert_eq!(history["status"], "succeeded");
        let events: Vec<&str> = history["journal"]
            .as_array()
            .map(|entries| entries.iter().filter_map(|e| e["event"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(events.first(), Some(&"initiated"));
        assert_eq!(events.last(), Some(&"succeeded"));
        assert_eq!(events.iter().filter(|e| **e == "stage_started").count(), 4);
        assert_eq!(history["journal"][0]["sequence"], 0);
    }
}
