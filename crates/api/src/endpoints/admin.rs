//! Admin endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use qa_common::{AppError, AppResult};
use qa_core::{ImportOptions, ImportStats, KnowledgeService};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use crate::{extractors::AdminUser, middleware::AppState, response::ApiResponse};

#[derive(Debug, Serialize)]
pub struct KnowledgeStats {
    pub entries: u64,
}

fn knowledge(state: &AppState) -> AppResult<&KnowledgeService> {
    state.knowledge_service.as_ref().ok_or_else(|| {
        AppError::BadRequest("Suggested answers are disabled on this server".to_string())
    })
}

/// Bulk-ingest answered questions into the knowledge base.
async fn import_knowledge_base(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    options: Option<Json<ImportOptions>>,
) -> AppResult<ApiResponse<ImportStats>> {
    let knowledge = knowledge(&state)?;
    let options = options.map(|Json(o)| o).unwrap_or_default();

    info!(admin_id = %admin.id, dry_run = options.dry_run, "Knowledge base import requested");
    let stats = knowledge.bulk_import(options).await?;
    Ok(ApiResponse::ok(stats))
}

async fn knowledge_base_stats(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<KnowledgeStats>> {
    let entries = knowledge(&state)?.entry_count().await?;
    Ok(ApiResponse::ok(KnowledgeStats { entries }))
}

/// Remove a single entry, keyed by the question it was built from.
async fn delete_knowledge_entry(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    knowledge(&state)?.remove(&id).await?;
    info!(admin_id = %admin.id, entry_id = %id, "Knowledge entry deleted");
    Ok(ApiResponse::ok(json!({ "deleted": 1 })))
}

async fn clear_knowledge_base(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Value>> {
    let removed = knowledge(&state)?.clear().await?;
    info!(admin_id = %admin.id, removed, "Knowledge base cleared by admin");
    Ok(ApiResponse::ok(json!({ "deleted": removed })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/knowledge-base", delete(clear_knowledge_base))
        .route("/knowledge-base/import", post(import_knowledge_base))
        .route("/knowledge-base/stats", get(knowledge_base_stats))
        .route("/knowledge-base/{id}", delete(delete_knowledge_entry))
}
