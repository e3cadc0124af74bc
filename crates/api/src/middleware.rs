//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use qa_core::{AuthService, HealthService, KnowledgeService, QuestionService};
use tracing::debug;

use crate::streaming::StreamingState;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub question_service: QuestionService,
    pub knowledge_service: Option<KnowledgeService>,
    pub health_service: HealthService,
    pub streaming: StreamingState,
}

/// Authentication middleware.
///
/// Resolves a `Bearer` token to its user and stores it in the request
/// extensions. Missing or invalid tokens leave the request anonymous; the
/// extractors decide whether that is acceptable.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.auth_service.authenticate_token(token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) => debug!(error = %e, "Ignoring invalid bearer token"),
        }
    }

    next.run(req).await
}
