//! Health endpoints.

use axum::{Router, extract::State, routing::get};
use qa_core::{DetailedHealth, HealthStatus};

use crate::{middleware::AppState, response::ApiResponse};

async fn health(State(state): State<AppState>) -> ApiResponse<HealthStatus> {
    ApiResponse::ok(state.health_service.basic())
}

async fn health_detailed(State(state): State<AppState>) -> ApiResponse<DetailedHealth> {
    ApiResponse::ok(state.health_service.detailed().await)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/detailed", get(health_detailed))
}
