//! Event publisher service.
//!
//! Provides an abstraction for publishing live-update events.
//! The actual implementation is provided by the API crate (WebSocket broadcast).

use async_trait::async_trait;
use qa_common::AppResult;
use std::sync::Arc;

use super::question::{AnswerDto, QuestionDto};
use super::suggestion::Suggestion;

/// Trait for publishing live-update events.
///
/// This allows the core services to publish events
/// without directly depending on the transport.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a question created event.
    async fn publish_question_created(&self, question: &QuestionDto) -> AppResult<()>;

    /// Publish an answer created event.
    async fn publish_answer_created(&self, question_id: &str, answer: &AnswerDto) -> AppResult<()>;

    /// Publish a question answered event.
    async fn publish_question_answered(&self, question_id: &str) -> AppResult<()>;

    /// Publish a suggested answer for a question.
    async fn publish_suggestion_created(
        &self,
        question_id: &str,
        suggestion: &Suggestion,
    ) -> AppResult<()>;
}

/// A no-op implementation of `EventPublisher` for tests or when live updates are disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish_question_created(&self, _question: &QuestionDto) -> AppResult<()> {
        Ok(())
    }

    async fn publish_answer_created(
        &self,
        _question_id: &str,
        _answer: &AnswerDto,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn publish_question_answered(&self, _question_id: &str) -> AppResult<()> {
        Ok(())
    }

    async fn publish_suggestion_created(
        &self,
        _question_id: &str,
        _suggestion: &Suggestion,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Wrapper for boxed `EventPublisher` trait object.
pub type EventPublisherService = Arc<dyn EventPublisher>;
