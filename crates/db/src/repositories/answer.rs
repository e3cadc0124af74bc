//! Answer repository.

use std::sync::Arc;

use crate::entities::{Answer, answer};
use qa_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

/// Answer repository for database operations.
#[derive(Clone)]
pub struct AnswerRepository {
    db: Arc<DatabaseConnection>,
}

impl AnswerRepository {
    /// Create a new answer repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a new answer.
    pub async fn create(&self, model: answer::ActiveModel) -> AppResult<answer::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Answers to one question, oldest first.
    pub async fn find_by_question(&self, question_id: &str) -> AppResult<Vec<answer::Model>> {
        Answer::find()
            .filter(answer::Column::QuestionId.eq(question_id))
            .order_by_asc(answer::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Answers to several questions at once, oldest first.
    pub async fn find_by_questions(&self, question_ids: &[String]) -> AppResult<Vec<answer::Model>> {
        if question_ids.is_empty() {
            return Ok(vec![]);
        }

        Answer::find()
            .filter(answer::Column::QuestionId.is_in(question_ids.to_vec()))
            .order_by_asc(answer::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
