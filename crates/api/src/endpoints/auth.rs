//! Authentication endpoints.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use qa_common::AppResult;
use qa_core::{LoginInput, RegisterInput, TokenResponse, UserDto};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Create a new account and sign it in.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterInput>,
) -> AppResult<ApiResponse<TokenResponse>> {
    let token = state.auth_service.register(req).await?;
    Ok(ApiResponse::created(token))
}

/// Exchange credentials for an access token.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginInput>,
) -> AppResult<ApiResponse<TokenResponse>> {
    let token = state.auth_service.login(req).await?;
    Ok(ApiResponse::ok(token))
}

/// Current user.
async fn me(AuthUser(user): AuthUser) -> ApiResponse<UserDto> {
    ApiResponse::ok(UserDto::from(&user))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}
