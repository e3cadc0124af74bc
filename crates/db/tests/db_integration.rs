//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance with pgvector.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `qa_test`)
//!   `TEST_DB_PASSWORD` (default: `qa_test`)
//!   `TEST_DB_NAME` (default: `qa_test`)

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use qa_db::entities::question::{self, ModerationAction, QuestionStatus};
use qa_db::entities::user::UserRole;
use qa_db::migrations::DEFAULT_EMBEDDING_DIMENSIONS;
use qa_db::repositories::{
    KnowledgeBaseRepository, KnowledgeEntry, QuestionRepository, UserRepository,
};
use qa_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::Set;
use serde_json::json;

fn unit_vector(hot: usize) -> Vec<f32> {
    let mut v = vec![0.0; DEFAULT_EMBEDDING_DIMENSIONS];
    v[hot] = 1.0;
    v
}

fn new_question(id: &str, user_id: &str, status: QuestionStatus) -> question::ActiveModel {
    question::ActiveModel {
        id: Set(id.to_string()),
        message: Set(format!("question {id}")),
        status: Set(status),
        user_id: Set(user_id.to_string()),
        classification_label: Set("SAFE".to_string()),
        moderation_action: Set(ModerationAction::Allow),
        moderation_reason: Set("ok".to_string()),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_migrations_create_vector_column() {
    let db = TestDatabase::new().await.unwrap();
    let repo = KnowledgeBaseRepository::new(db.connection());

    let dims = repo.embedding_dimensions().await.unwrap();
    assert_eq!(dims, Some(DEFAULT_EMBEDDING_DIMENSIONS));
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_deactivate_user() {
    let db = TestDatabase::new().await.unwrap();
    db.cleanup().await.unwrap();
    db.seed_user("u1", UserRole::Guest).await.unwrap();

    let repo = UserRepository::new(db.connection());
    repo.deactivate("u1").await.unwrap();

    assert!(!repo.get_by_id("u1").await.unwrap().is_active);
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_list_puts_escalated_first() {
    let db = TestDatabase::new().await.unwrap();
    db.cleanup().await.unwrap();
    db.seed_user("u1", UserRole::Guest).await.unwrap();

    let repo = QuestionRepository::new(db.connection());
    repo.create(new_question("q1", "u1", QuestionStatus::Escalated))
        .await
        .unwrap();
    repo.create(new_question("q2", "u1", QuestionStatus::Pending))
        .await
        .unwrap();

    let listed = repo.list(0, 10).await.unwrap();
    assert_eq!(listed[0].id, "q1");
    assert_eq!(listed[1].id, "q2");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_knowledge_base_search_respects_threshold() {
    let db = TestDatabase::new().await.unwrap();
    db.cleanup().await.unwrap();
    let repo = KnowledgeBaseRepository::new(db.connection());

    for (id, hot) in [("q1", 0), ("q2", 1)] {
        repo.upsert(&KnowledgeEntry {
            id: id.to_string(),
            content: format!("Q: {id}\n\nA: answer"),
            metadata: json!({ "question_id": id }),
            embedding: unit_vector(hot),
        })
        .await
        .unwrap();
    }

    let matches = repo.search(&unit_vector(0), 3, 0.7).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "q1");
    assert!(matches[0].similarity > 0.99);

    // Upsert by the same id replaces instead of duplicating.
    repo.upsert(&KnowledgeEntry {
        id: "q1".to_string(),
        content: "Q: q1\n\nA: updated".to_string(),
        metadata: json!({}),
        embedding: unit_vector(0),
    })
    .await
    .unwrap();
    assert_eq!(repo.count().await.unwrap(), 2);
}

#[test]
fn test_database_url_format() {
    let config = TestDbConfig {
        host: "testhost".to_string(),
        port: 5432,
        username: "testuser".to_string(),
        password: "testpass".to_string(),
        database: "testdb".to_string(),
    };

    let url = config.database_url();
    assert!(url.starts_with("postgres://"));
    assert!(url.contains("testhost"));
    assert!(url.contains("5432"));
}
