//! Question and answer endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use qa_common::AppResult;
use qa_core::{
    CreateAnswerInput, CreateQuestionInput, CreatedAnswer, CreatedQuestion, QuestionDto,
    Suggestion,
};
use qa_db::entities::user;
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: u64,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct MarkedAnswered {
    pub message: &'static str,
    pub question: QuestionDto,
}

#[derive(Debug, Serialize)]
pub struct SuggestionResponse {
    pub question_id: String,
    pub suggestion: Option<Suggestion>,
}

/// Anonymous writers post as the shared guest account.
async fn author_or_guest(state: &AppState, user: Option<user::Model>) -> AppResult<user::Model> {
    match user {
        Some(user) => Ok(user),
        None => state.auth_service.get_or_create_guest().await,
    }
}

async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<QuestionDto>>> {
    let questions = state
        .question_service
        .list(query.skip, query.limit)
        .await?;
    Ok(ApiResponse::ok(questions))
}

async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<QuestionDto>> {
    let question = state.question_service.get(&id).await?;
    Ok(ApiResponse::ok(question))
}

async fn create_question(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateQuestionInput>,
) -> AppResult<ApiResponse<CreatedQuestion>> {
    let author = author_or_guest(&state, user).await?;
    let created = state.question_service.create(&author, req).await?;
    Ok(ApiResponse::created(created))
}

async fn create_answer(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateAnswerInput>,
) -> AppResult<ApiResponse<CreatedAnswer>> {
    let author = author_or_guest(&state, user).await?;
    let created = state.question_service.answer(&author, &id, req).await?;
    Ok(ApiResponse::created(created))
}

async fn mark_answered(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<MarkedAnswered>> {
    let question = state.question_service.mark_answered(&id).await?;
    Ok(ApiResponse::ok(MarkedAnswered {
        message: "Question marked as answered",
        question,
    }))
}

async fn get_suggestion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<SuggestionResponse>> {
    let suggestion = state.question_service.suggestion_for(&id).await?;
    Ok(ApiResponse::ok(SuggestionResponse {
        question_id: id,
        suggestion,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_questions).post(create_question))
        .route("/{id}", get(get_question))
        .route("/{id}/answers", post(create_answer))
        .route("/{id}/mark-answered", patch(mark_answered))
        .route("/{id}/suggestion", get(get_suggestion))
}
