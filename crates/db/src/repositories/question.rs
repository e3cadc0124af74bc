//! Question repository.

use std::sync::Arc;

use crate::entities::{
    Question,
    question::{self, QuestionStatus},
};
use chrono::Utc;
use qa_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Order,
    QueryFilter, QueryOrder, QuerySelect, Set, sea_query::Expr,
};

/// Question repository for database operations.
#[derive(Clone)]
pub struct QuestionRepository {
    db: Arc<DatabaseConnection>,
}

impl QuestionRepository {
    /// Create a new question repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a question by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<question::Model>> {
        Question::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a question by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<question::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::QuestionNotFound(id.to_string()))
    }

    /// Create a new question.
    pub async fn create(&self, model: question::ActiveModel) -> AppResult<question::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List questions: escalated first, then newest first.
    pub async fn list(&self, offset: u64, limit: u64) -> AppResult<Vec<question::Model>> {
        Question::find()
            .order_by(
                Expr::cust("CASE WHEN status = 'Escalated' THEN 0 ELSE 1 END"),
                Order::Asc,
            )
            .order_by_desc(question::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find every question with the given status, oldest first.
    pub async fn find_by_status(&self, status: QuestionStatus) -> AppResult<Vec<question::Model>> {
        Question::find()
            .filter(question::Column::Status.eq(status))
            .order_by_asc(question::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Set the status of a question.
    ///
    /// Moderation fields are never touched here.
    pub async fn update_status(
        &self,
        question: question::Model,
        status: QuestionStatus,
    ) -> AppResult<question::Model> {
        let mut active = question.into_active_model();
        active.status = Set(status);
        active.updated_at = Set(Some(Utc::now().into()));

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
