//! Question service: the moderated write path and question listing.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset, Utc};
use qa_common::{AppError, AppResult, IdGenerator};
use qa_db::{
    entities::{
        answer,
        question::{self, ModerationAction, QuestionStatus},
        user,
    },
    repositories::{AnswerRepository, QuestionRepository, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

use super::event_publisher::EventPublisherService;
use super::knowledge::KnowledgeService;
use super::moderation::{ModerationDecision, ModerationService};
use super::suggestion::{Suggestion, SuggestionService};

/// Default and maximum page size for listings.
pub const MAX_PAGE_SIZE: u64 = 100;

const UNKNOWN_USERNAME: &str = "Unknown";

/// Input for posting a question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionInput {
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
}

/// Input for answering a question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAnswerInput {
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
}

/// Moderation outcome attached to stored content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationDto {
    pub label: String,
    pub action: ModerationAction,
    pub reason: String,
}

impl From<ModerationDecision> for ModerationDto {
    fn from(d: ModerationDecision) -> Self {
        Self {
            label: d.label,
            action: d.action,
            reason: d.reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDto {
    pub id: String,
    pub question_id: String,
    pub message: String,
    pub user_id: String,
    pub username: String,
    pub timestamp: DateTime<FixedOffset>,
    pub moderation: ModerationDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDto {
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<FixedOffset>,
    pub status: QuestionStatus,
    pub user_id: String,
    pub username: String,
    pub moderation: ModerationDto,
    pub answers: Vec<AnswerDto>,
}

/// Response to a successful question submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedQuestion {
    pub id: String,
    pub message: String,
    pub moderation: ModerationDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Suggestion>,
}

/// Response to a successful answer submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedAnswer {
    pub id: String,
    pub message: String,
    pub moderation: ModerationDto,
}

fn answer_to_dto(a: &answer::Model, username: &str) -> AnswerDto {
    AnswerDto {
        id: a.id.clone(),
        question_id: a.question_id.clone(),
        message: a.message.clone(),
        user_id: a.user_id.clone(),
        username: username.to_string(),
        timestamp: a.created_at,
        moderation: ModerationDto {
            label: a.classification_label.clone(),
            action: a.moderation_action,
            reason: a.moderation_reason.clone(),
        },
    }
}

fn question_to_dto(q: &question::Model, username: &str, answers: Vec<AnswerDto>) -> QuestionDto {
    QuestionDto {
        id: q.id.clone(),
        message: q.message.clone(),
        timestamp: q.created_at,
        status: q.status,
        user_id: q.user_id.clone(),
        username: username.to_string(),
        moderation: ModerationDto {
            label: q.classification_label.clone(),
            action: q.moderation_action,
            reason: q.moderation_reason.clone(),
        },
        answers,
    }
}

/// Status a new question is stored with.
#[must_use]
pub const fn initial_status(action: ModerationAction) -> QuestionStatus {
    match action {
        ModerationAction::Flag => QuestionStatus::Escalated,
        _ => QuestionStatus::Pending,
    }
}

/// Question service for business logic.
#[derive(Clone)]
pub struct QuestionService {
    question_repo: QuestionRepository,
    answer_repo: AnswerRepository,
    user_repo: UserRepository,
    moderation: ModerationService,
    suggestion: Option<SuggestionService>,
    knowledge: Option<KnowledgeService>,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
}

impl QuestionService {
    /// Create a new question service.
    #[must_use]
    pub fn new(
        question_repo: QuestionRepository,
        answer_repo: AnswerRepository,
        user_repo: UserRepository,
        moderation: ModerationService,
    ) -> Self {
        Self {
            question_repo,
            answer_repo,
            user_repo,
            moderation,
            suggestion: None,
            knowledge: None,
            event_publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Enable suggested answers.
    pub fn set_suggestion_service(&mut self, suggestion: SuggestionService) {
        self.suggestion = Some(suggestion);
    }

    /// Enable indexing of answered questions.
    pub fn set_knowledge_service(&mut self, knowledge: KnowledgeService) {
        self.knowledge = Some(knowledge);
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// List questions with their answers: escalated first, then newest first.
    pub async fn list(&self, skip: u64, limit: Option<u64>) -> AppResult<Vec<QuestionDto>> {
        let limit = limit.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let questions = self.question_repo.list(skip, limit).await?;
        self.assemble(questions).await
    }

    /// Get one question with its answers.
    pub async fn get(&self, id: &str) -> AppResult<QuestionDto> {
        let question = self.question_repo.get_by_id(id).await?;
        let mut dtos = self.assemble(vec![question]).await?;
        dtos.pop()
            .ok_or_else(|| AppError::QuestionNotFound(id.to_string()))
    }

    /// Post a question through the moderation gate.
    ///
    /// A banned submission is not stored and its author is deactivated.
    pub async fn create(
        &self,
        author: &user::Model,
        input: CreateQuestionInput,
    ) -> AppResult<CreatedQuestion> {
        input.validate()?;
        ensure_active(author)?;
        let message = non_blank(&input.message)?;

        let decision = self.moderation.enforce(author, message).await?;

        let now = Utc::now();
        let model = question::ActiveModel {
            id: Set(self.id_gen.generate()),
            message: Set(message.to_string()),
            status: Set(initial_status(decision.action)),
            user_id: Set(author.id.clone()),
            classification_label: Set(decision.label.clone()),
            moderation_action: Set(decision.action),
            moderation_reason: Set(decision.reason.clone()),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };
        let question = self.question_repo.create(model).await?;
        info!(
            question_id = %question.id,
            user_id = %author.id,
            status = ?question.status,
            "Question created"
        );

        let dto = question_to_dto(&question, &author.username, vec![]);
        if let Some(ref event_publisher) = self.event_publisher
            && let Err(e) = event_publisher.publish_question_created(&dto).await
        {
            warn!(error = %e, question_id = %question.id, "Failed to publish question created event");
        }

        let suggestion = match self.suggestion {
            Some(ref svc) => svc.suggest(&question.message).await,
            None => None,
        };
        if let (Some(suggestion), Some(event_publisher)) = (&suggestion, &self.event_publisher)
            && let Err(e) = event_publisher
                .publish_suggestion_created(&question.id, suggestion)
                .await
        {
            warn!(error = %e, question_id = %question.id, "Failed to publish suggestion event");
        }

        Ok(CreatedQuestion {
            id: question.id,
            message: "Question created successfully".to_string(),
            moderation: decision.into(),
            suggestion,
        })
    }

    /// Answer a question through the moderation gate.
    pub async fn answer(
        &self,
        author: &user::Model,
        question_id: &str,
        input: CreateAnswerInput,
    ) -> AppResult<CreatedAnswer> {
        input.validate()?;
        ensure_active(author)?;
        let message = non_blank(&input.message)?;

        let question = self.question_repo.get_by_id(question_id).await?;

        let decision = self.moderation.enforce(author, message).await?;

        let model = answer::ActiveModel {
            id: Set(self.id_gen.generate()),
            question_id: Set(question.id.clone()),
            message: Set(message.to_string()),
            user_id: Set(author.id.clone()),
            classification_label: Set(decision.label.clone()),
            moderation_action: Set(decision.action),
            moderation_reason: Set(decision.reason.clone()),
            created_at: Set(Utc::now().into()),
        };
        let answer = self.answer_repo.create(model).await?;
        info!(answer_id = %answer.id, question_id = %question.id, "Answer created");

        if let Some(ref event_publisher) = self.event_publisher {
            let dto = answer_to_dto(&answer, &author.username);
            if let Err(e) = event_publisher
                .publish_answer_created(&question.id, &dto)
                .await
            {
                warn!(error = %e, answer_id = %answer.id, "Failed to publish answer created event");
            }
        }

        Ok(CreatedAnswer {
            id: answer.id,
            message: "Answer created successfully".to_string(),
            moderation: decision.into(),
        })
    }

    /// Mark a question answered and index it into the knowledge base.
    ///
    /// Indexing is best effort; its failures are logged, not returned.
    pub async fn mark_answered(&self, question_id: &str) -> AppResult<QuestionDto> {
        let question = self.question_repo.get_by_id(question_id).await?;
        let question = self
            .question_repo
            .update_status(question, QuestionStatus::Answered)
            .await?;
        info!(question_id = %question.id, "Question marked as answered");

        if let Some(ref event_publisher) = self.event_publisher
            && let Err(e) = event_publisher.publish_question_answered(&question.id).await
        {
            warn!(error = %e, question_id = %question.id, "Failed to publish question answered event");
        }

        let answers = self.answer_repo.find_by_question(&question.id).await?;

        if let Some(ref knowledge) = self.knowledge {
            match knowledge.index_question(&question, &answers, true).await {
                Ok(true) => {}
                Ok(false) => debug!(question_id = %question.id, "No answer to index yet"),
                Err(e) => {
                    warn!(error = %e, question_id = %question.id, "Failed to index answered question");
                }
            }
        }

        let mut dtos = self.with_answers(vec![question], answers).await?;
        dtos.pop()
            .ok_or_else(|| AppError::QuestionNotFound(question_id.to_string()))
    }

    /// Compute a suggestion for an existing question on demand.
    pub async fn suggestion_for(&self, question_id: &str) -> AppResult<Option<Suggestion>> {
        let question = self.question_repo.get_by_id(question_id).await?;
        Ok(match self.suggestion {
            Some(ref svc) => svc.suggest(&question.message).await,
            None => None,
        })
    }

    async fn assemble(&self, questions: Vec<question::Model>) -> AppResult<Vec<QuestionDto>> {
        let ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
        let answers = self.answer_repo.find_by_questions(&ids).await?;
        self.with_answers(questions, answers).await
    }

    async fn with_answers(
        &self,
        questions: Vec<question::Model>,
        answers: Vec<answer::Model>,
    ) -> AppResult<Vec<QuestionDto>> {
        let user_ids: Vec<String> = questions
            .iter()
            .map(|q| q.user_id.clone())
            .chain(answers.iter().map(|a| a.user_id.clone()))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let usernames: HashMap<String, String> = self
            .user_repo
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();
        let username_of = |id: &str| {
            usernames
                .get(id)
                .map_or(UNKNOWN_USERNAME, String::as_str)
                .to_string()
        };

        let mut answers_by_question: HashMap<String, Vec<AnswerDto>> = HashMap::new();
        for a in &answers {
            answers_by_question
                .entry(a.question_id.clone())
                .or_default()
                .push(answer_to_dto(a, &username_of(&a.user_id)));
        }

        Ok(questions
            .iter()
            .map(|q| {
                let answers = answers_by_question.remove(&q.id).unwrap_or_default();
                question_to_dto(q, &username_of(&q.user_id), answers)
            })
            .collect())
    }
}

fn ensure_active(author: &user::Model) -> AppResult<()> {
    if author.is_active {
        Ok(())
    } else {
        Err(AppError::Forbidden("Account is deactivated".to_string()))
    }
}

fn non_blank(message: &str) -> AppResult<&str> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("message must not be blank".to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use qa_db::entities::user::UserRole;
    use qa_db::repositories::KnowledgeBaseRepository;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult, Value};
    use std::sync::{Arc, Mutex};

    use crate::services::event_publisher::EventPublisher;
    use crate::services::moderation::tests::{FixedClassifier, deactivates};
    use crate::services::suggestion::SuggestionSettings;
    use crate::services::suggestion::tests::{FakeCompletion, FakeEmbedder};

    /// Records the names of published events.
    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<String>>,
    }

    impl RecordingPublisher {
        fn push(&self, event: &str) {
            self.events.lock().unwrap().push(event.to_string());
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish_question_created(&self, _question: &QuestionDto) -> AppResult<()> {
            self.push("question_created");
            Ok(())
        }

        async fn publish_answer_created(&self, _id: &str, _answer: &AnswerDto) -> AppResult<()> {
            self.push("answer_created");
            Ok(())
        }

        async fn publish_question_answered(&self, _id: &str) -> AppResult<()> {
            self.push("question_answered");
            Ok(())
        }

        async fn publish_suggestion_created(
            &self,
            _id: &str,
            _suggestion: &Suggestion,
        ) -> AppResult<()> {
            self.push("suggestion_created");
            Ok(())
        }
    }

    fn author(active: bool) -> user::Model {
        user::Model {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "x".to_string(),
            role: UserRole::Guest,
            is_active: active,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn stored_question(id: &str, status: QuestionStatus, action: ModerationAction) -> question::Model {
        question::Model {
            id: id.to_string(),
            message: "How do I reset my password?".to_string(),
            status,
            user_id: "u1".to_string(),
            classification_label: "SAFE".to_string(),
            moderation_action: action,
            moderation_reason: "ok".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn inserts_into(log: &[sea_orm::Transaction], table: &str) -> bool {
        let prefix = format!(r#"INSERT INTO "{table}""#);
        log.iter()
            .flat_map(|t| t.statements())
            .any(|stmt| stmt.sql.starts_with(&prefix))
    }

    fn stored_answer(id: &str, question_id: &str) -> answer::Model {
        answer::Model {
            id: id.to_string(),
            question_id: question_id.to_string(),
            message: "Use the reset link.".to_string(),
            user_id: "u2".to_string(),
            classification_label: "SAFE".to_string(),
            moderation_action: ModerationAction::Allow,
            moderation_reason: "ok".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn service(label: Option<&'static str>, db: MockDatabase) -> (QuestionService, Arc<RecordingPublisher>) {
        shared_service(label, Arc::new(db.into_connection()))
    }

    fn shared_service(
        label: Option<&'static str>,
        conn: Arc<DatabaseConnection>,
    ) -> (QuestionService, Arc<RecordingPublisher>) {
        let user_repo = UserRepository::new(Arc::clone(&conn));
        let moderation = ModerationService::new(Arc::new(FixedClassifier { label }), user_repo.clone());
        let mut svc = QuestionService::new(
            QuestionRepository::new(Arc::clone(&conn)),
            AnswerRepository::new(Arc::clone(&conn)),
            user_repo,
            moderation,
        );
        let publisher = Arc::new(RecordingPublisher::default());
        svc.set_event_publisher(publisher.clone());
        (svc, publisher)
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(initial_status(ModerationAction::Flag), QuestionStatus::Escalated);
        assert_eq!(initial_status(ModerationAction::Warn), QuestionStatus::Pending);
        assert_eq!(initial_status(ModerationAction::Allow), QuestionStatus::Pending);
    }

    #[test]
    fn test_question_dto_uses_camel_case() {
        let dto = question_to_dto(
            &stored_question("q1", QuestionStatus::Pending, ModerationAction::Allow),
            "alice",
            vec![answer_to_dto(&stored_answer("a1", "q1"), "bob")],
        );
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["status"], "Pending");
        assert_eq!(json["moderation"]["action"], "allow");
        assert_eq!(json["answers"][0]["questionId"], "q1");
        assert_eq!(json["answers"][0]["username"], "bob");
    }

    #[tokio::test]
    async fn test_create_safe_question() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[
            stored_question("q1", QuestionStatus::Pending, ModerationAction::Allow),
        ]]);
        let (svc, publisher) = service(Some("SAFE"), db);

        let created = svc
            .create(
                &author(true),
                CreateQuestionInput {
                    message: "How do I reset my password?".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(created.id, "q1");
        assert_eq!(created.moderation.action, ModerationAction::Allow);
        assert!(created.suggestion.is_none());
        assert_eq!(publisher.events(), vec!["question_created"]);
    }

    #[tokio::test]
    async fn test_flagged_question_is_escalated() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[
            stored_question("q1", QuestionStatus::Escalated, ModerationAction::Flag),
        ]]);
        let (svc, _) = service(Some("VIOLENCE"), db);

        let created = svc
            .create(
                &author(true),
                CreateQuestionInput {
                    message: "something violent".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(created.moderation.action, ModerationAction::Flag);
        assert_eq!(created.moderation.label, "VIOLENCE");
    }

    #[tokio::test]
    async fn test_banned_question_is_not_persisted() {
        // Only the deactivation UPDATE is scripted; an INSERT would fail the mock.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let (svc, publisher) = shared_service(Some("SPAM"), Arc::clone(&db));

        let result = svc
            .create(
                &author(true),
                CreateQuestionInput {
                    message: "cheap pills here".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::ContentRejected { .. })));
        assert!(publisher.events().is_empty());
        drop(svc);

        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        assert!(deactivates(&log, "u1"));
        assert!(!inserts_into(&log, "question"));
    }

    #[tokio::test]
    async fn test_classifier_down_fails_closed() {
        let (svc, publisher) = service(None, MockDatabase::new(DatabaseBackend::Postgres));

        let result = svc
            .create(
                &author(true),
                CreateQuestionInput {
                    message: "hello".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::ExternalService(_))));
        assert!(publisher.events().is_empty());
    }

    #[tokio::test]
    async fn test_inactive_author_is_refused() {
        let (svc, _) = service(Some("SAFE"), MockDatabase::new(DatabaseBackend::Postgres));

        let result = svc
            .create(
                &author(false),
                CreateQuestionInput {
                    message: "hello".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let (svc, _) = service(Some("SAFE"), MockDatabase::new(DatabaseBackend::Postgres));

        let result = svc
            .create(
                &author(true),
                CreateQuestionInput {
                    message: "   ".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_suggestion_attached_and_published() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[stored_question(
                "q1",
                QuestionStatus::Pending,
                ModerationAction::Allow,
            )]])
            .append_query_results([vec![maplit::btreemap! {
                "id" => sea_orm::Value::from("q0"),
                "content" => sea_orm::Value::from("Q: reset?\n\nA: use the link"),
                "metadata" => sea_orm::Value::from(serde_json::json!({})),
                "similarity" => sea_orm::Value::from(0.92_f64),
            }]]);
        let conn = Arc::new(db.into_connection());
        let user_repo = UserRepository::new(Arc::clone(&conn));
        let mut svc = QuestionService::new(
            QuestionRepository::new(Arc::clone(&conn)),
            AnswerRepository::new(Arc::clone(&conn)),
            user_repo.clone(),
            ModerationService::new(Arc::new(FixedClassifier { label: Some("SAFE") }), user_repo),
        );
        svc.set_suggestion_service(SuggestionService::new(
            Arc::new(FakeEmbedder { fail: false }),
            KnowledgeBaseRepository::new(conn),
            Arc::new(FakeCompletion::default()),
            SuggestionSettings {
                retrieval_limit: 3,
                similarity_threshold: 0.7,
                suggestion_threshold: 0.6,
            },
        ));
        let publisher = Arc::new(RecordingPublisher::default());
        svc.set_event_publisher(publisher.clone());

        let created = svc
            .create(
                &author(true),
                CreateQuestionInput {
                    message: "How do I reset my password?".to_string(),
                },
            )
            .await
            .unwrap();

        let suggestion = created.suggestion.unwrap();
        assert!(suggestion.confidence > 0.6);
        assert_eq!(
            publisher.events(),
            vec!["question_created", "suggestion_created"]
        );
    }

    #[tokio::test]
    async fn test_answer_unknown_question() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<question::Model>::new()]);
        let (svc, _) = service(Some("SAFE"), db);

        let result = svc
            .answer(
                &author(true),
                "missing",
                CreateAnswerInput {
                    message: "an answer".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::QuestionNotFound(_))));
    }

    #[tokio::test]
    async fn test_banned_answer_is_not_persisted() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[stored_question(
                    "q1",
                    QuestionStatus::Pending,
                    ModerationAction::Allow,
                )]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let (svc, publisher) = shared_service(Some("ABUSIVE_LANGUAGE"), Arc::clone(&db));

        let result = svc
            .answer(
                &author(true),
                "q1",
                CreateAnswerInput {
                    message: "you are an idiot".to_string(),
                },
            )
            .await;

        match result {
            Err(AppError::ContentRejected { label, .. }) => assert_eq!(label, "ABUSIVE_LANGUAGE"),
            other => panic!("expected ContentRejected, got {other:?}"),
        }
        assert!(publisher.events().is_empty());
        drop(svc);

        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        assert!(deactivates(&log, "u1"));
        assert!(!inserts_into(&log, "answer"));
    }

    #[tokio::test]
    async fn test_answer_created() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[stored_question(
                "q1",
                QuestionStatus::Pending,
                ModerationAction::Allow,
            )]])
            .append_query_results([[stored_answer("a1", "q1")]]);
        let (svc, publisher) = service(Some("MISINFORMATION"), db);

        let created = svc
            .answer(
                &author(true),
                "q1",
                CreateAnswerInput {
                    message: "Use the reset link.".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(created.id, "a1");
        assert_eq!(created.moderation.action, ModerationAction::Warn);
        assert_eq!(publisher.events(), vec!["answer_created"]);
    }

    #[tokio::test]
    async fn test_mark_answered() {
        let pending = stored_question("q1", QuestionStatus::Pending, ModerationAction::Allow);
        let mut answered = pending.clone();
        answered.status = QuestionStatus::Answered;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[pending]])
            .append_query_results([[answered]])
            .append_query_results([[stored_answer("a1", "q1")]])
            .append_query_results([[author(true)]]);
        let (svc, publisher) = service(Some("SAFE"), db);

        let dto = svc.mark_answered("q1").await.unwrap();

        assert_eq!(dto.status, QuestionStatus::Answered);
        assert_eq!(dto.answers.len(), 1);
        assert_eq!(dto.username, "alice");
        // Author of a1 (u2) is not among the returned users.
        assert_eq!(dto.answers[0].username, UNKNOWN_USERNAME);
        assert_eq!(publisher.events(), vec!["question_answered"]);
    }

    #[tokio::test]
    async fn test_list_clamps_limit() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<question::Model>::new()])
                .into_connection(),
        );
        let (svc, _) = shared_service(Some("SAFE"), Arc::clone(&db));

        let listed = svc.list(7, Some(10_000)).await.unwrap();
        assert!(listed.is_empty());
        drop(svc);

        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        let select = &log[0].statements()[0];
        assert!(select.sql.contains("LIMIT"));
        let values = &select.values.as_ref().unwrap().0;
        assert!(values.contains(&Value::from(100u64)));
        assert!(values.contains(&Value::from(7u64)));
    }
}
