//! API endpoints.

mod admin;
mod auth;
mod health;
mod questions;

use axum::{Router, routing::get};

use crate::middleware::AppState;
use crate::streaming::streaming_handler;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/questions", questions::router())
        .nest("/admin", admin::router())
        .nest("/health", health::router())
        .route("/ws", get(streaming_handler))
}
