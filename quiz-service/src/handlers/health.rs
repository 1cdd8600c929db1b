use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

const SERVICE_NAME: &str = "quiz-service";

const ENDPOINTS: [&str; 6] = [
    "GET / - This message",
    "GET /health - Liveness check",
    "GET /ready - Readiness check",
    "GET /metrics - Prometheus metrics",
    "POST /generate - Generate a quiz from text",
    "POST /api/generate-quiz - Generate a quiz from an uploaded PDF or TXT document",
];

/// Liveness: the process is up and the model host was built.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let provider = state.generator.provider();
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "provider": provider.name(),
        "model": provider.model_id(),
        "uptime_seconds": state.started_at.elapsed().as_secs()
    }))
}

/// Readiness: the provider can serve generations right now.
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state
        .generator
        .provider()
        .health_check()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Provider not ready");
            AppError::ServiceUnavailable
        })?;

    Ok(StatusCode::OK)
}

pub async fn index() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "Quiz generator API is working",
        "endpoints": ENDPOINTS
    }))
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "available_endpoints": ENDPOINTS
        })),
    )
}
