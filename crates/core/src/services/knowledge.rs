//! Knowledge base ingestion: turns answered questions into retrievable entries.

use std::collections::HashMap;

use qa_common::{AppError, AppResult};
use qa_db::{
    entities::{
        answer,
        question::{self, QuestionStatus},
    },
    repositories::{AnswerRepository, KnowledgeBaseRepository, KnowledgeEntry, QuestionRepository},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use super::embedding::EmbedderService;

/// Options for [`KnowledgeService::bulk_import`].
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ImportOptions {
    /// Count what would be imported without writing.
    #[serde(default)]
    pub dry_run: bool,
    /// Pair each question with its earliest answer instead of its latest.
    #[serde(default = "default_true")]
    pub use_first_answer: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            use_first_answer: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Per-question import failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportError {
    pub question_id: String,
    pub error: String,
}

/// Bulk import statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub total_questions: usize,
    pub questions_with_answers: usize,
    pub imported: usize,
    pub skipped: usize,
    pub errors: usize,
    pub error_details: Vec<ImportError>,
}

/// Knowledge ingestion service.
#[derive(Clone)]
pub struct KnowledgeService {
    embedder: EmbedderService,
    knowledge_repo: KnowledgeBaseRepository,
    question_repo: QuestionRepository,
    answer_repo: AnswerRepository,
}

impl KnowledgeService {
    #[must_use]
    pub const fn new(
        embedder: EmbedderService,
        knowledge_repo: KnowledgeBaseRepository,
        question_repo: QuestionRepository,
        answer_repo: AnswerRepository,
    ) -> Self {
        Self {
            embedder,
            knowledge_repo,
            question_repo,
            answer_repo,
        }
    }

    /// Store `question` paired with one of its answers, keyed by question ID.
    ///
    /// `answers` must be ordered oldest first. Returns `false` when there is no answer.
    pub async fn index_question(
        &self,
        question: &question::Model,
        answers: &[answer::Model],
        use_first_answer: bool,
    ) -> AppResult<bool> {
        let Some(answer) = pick_answer(answers, use_first_answer) else {
            return Ok(false);
        };

        let content = knowledge_content(&question.message, &answer.message);
        let embedding = self.embedder.embed(&content).await?;

        self.knowledge_repo
            .upsert(&KnowledgeEntry {
                id: question.id.clone(),
                content,
                metadata: entry_metadata(question, answer, answers.len()),
                embedding,
            })
            .await?;

        info!(question_id = %question.id, answer_id = %answer.id, "Question indexed into knowledge base");
        Ok(true)
    }

    /// Import every answered question that has at least one answer.
    ///
    /// Per-question failures are collected in the stats rather than aborting.
    pub async fn bulk_import(&self, options: ImportOptions) -> AppResult<ImportStats> {
        let questions = self
            .question_repo
            .find_by_status(QuestionStatus::Answered)
            .await?;
        let ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();

        let mut answers_by_question: HashMap<String, Vec<answer::Model>> = HashMap::new();
        for answer in self.answer_repo.find_by_questions(&ids).await? {
            answers_by_question
                .entry(answer.question_id.clone())
                .or_default()
                .push(answer);
        }

        let mut stats = ImportStats {
            total_questions: questions.len(),
            ..ImportStats::default()
        };

        for question in &questions {
            let answers = answers_by_question
                .get(&question.id)
                .map_or(&[][..], Vec::as_slice);
            if answers.is_empty() {
                stats.skipped += 1;
                continue;
            }
            stats.questions_with_answers += 1;

            if options.dry_run {
                stats.imported += 1;
                continue;
            }

            match self
                .index_question(question, answers, options.use_first_answer)
                .await
            {
                Ok(true) => stats.imported += 1,
                Ok(false) => stats.skipped += 1,
                Err(e) => {
                    error!(question_id = %question.id, error = %e, "Failed to import question");
                    stats.errors += 1;
                    stats.error_details.push(ImportError {
                        question_id: question.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            total = stats.total_questions,
            imported = stats.imported,
            skipped = stats.skipped,
            errors = stats.errors,
            dry_run = options.dry_run,
            "Knowledge base import finished"
        );
        Ok(stats)
    }

    /// Remove the entry stored for `id`.
    pub async fn remove(&self, id: &str) -> AppResult<()> {
        if !self.knowledge_repo.delete(id).await? {
            return Err(AppError::NotFound(format!("Knowledge entry {id}")));
        }
        info!(entry_id = %id, "Knowledge entry removed");
        Ok(())
    }

    /// Remove every entry. Returns how many were removed.
    pub async fn clear(&self) -> AppResult<u64> {
        let removed = self.knowledge_repo.delete_all().await?;
        info!(removed, "Knowledge base cleared");
        Ok(removed)
    }

    pub async fn entry_count(&self) -> AppResult<u64> {
        self.knowledge_repo.count().await
    }
}

/// Text stored and embedded for a Q&A pair.
#[must_use]
pub fn knowledge_content(question: &str, answer: &str) -> String {
    format!("Q: {}\n\nA: {}", question.trim(), answer.trim())
}

fn pick_answer(answers: &[answer::Model], use_first_answer: bool) -> Option<&answer::Model> {
    if use_first_answer {
        answers.first()
    } else {
        answers.last()
    }
}

fn entry_metadata(
    question: &question::Model,
    answer: &answer::Model,
    total_answers: usize,
) -> serde_json::Value {
    json!({
        "question_id": question.id,
        "answer_id": answer.id,
        "user_id": question.user_id,
        "question_created_at": question.created_at.to_rfc3339(),
        "answer_created_at": answer.created_at.to_rfc3339(),
        "total_answers": total_answers,
        "status": question.status,
    })
}
