//! HTTP API for creating operations and serving their status

use crate::config::ApiConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::orchestrator::{OperationParams, OrchestratorEngine};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<OrchestratorEngine>,
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, engine: Arc<OrchestratorEngine>) -> BridgeResult<()> {
    let state = AppState { engine };

    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| BridgeError::Internal(e.to_string()))?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/operations", post(create_operation).get(list_operations))
        .route("/operations/:id", get(get_operation))
        .route("/stats", get(get_stats))
        .with_state(state)
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create a new operation and start its pipeline
async fn create_operation(
    State(state): State<AppState>,
    Json(params): Json<OperationParams>,
) -> Response {
    match state.engine.create_and_start(&params) {
        Ok(operation) => {
            let snapshot = operation.snapshot().await;
            (StatusCode::CREATED, Json(snapshot)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Fetch one operation's snapshot
async fn get_operation(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.engine.store().get(&id) {
        Some(operation) => Json(operation.snapshot().await).into_response(),
        None => error_response(BridgeError::OperationNotFound(id.to_string())),
    }
}

/// List all operations, newest first
async fn list_operations(State(state): State<AppState>) -> Response {
    Json(state.engine.store().snapshots().await).into_response()
}

/// Operation counts by status
async fn get_stats(State(state): State<AppState>) -> Response {
    Json(state.engine.store().stats().await).into_response()
}

fn error_response(error: BridgeError) -> Response {
    let status = if error.is_invalid_request() {
        StatusCode::BAD_REQUEST
    } else if matches!(error, BridgeError::OperationNotFound(_)) {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}
