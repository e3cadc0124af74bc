//! Knowledge base repository backed by the `PostgreSQL` `vector` extension.
//!
//! sea-orm has no native `vector` column type, so every query here is a raw
//! [`Statement`] with embeddings passed as `'[x,y,...]'::vector` literals.

use std::sync::Arc;

use crate::migrations::DEFAULT_KNOWLEDGE_TABLE;
use qa_common::{AppError, AppResult};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, QueryResult, Statement};
use serde::{Deserialize, Serialize};

/// A row to store in the knowledge base.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeEntry {
    /// ID of the question the entry was built from.
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub embedding: Vec<f32>,
}

/// A knowledge base row returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeMatch {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Value,
    /// Cosine similarity, `1 - cosine distance`.
    pub similarity: f64,
}

/// Knowledge base repository.
#[derive(Clone)]
pub struct KnowledgeBaseRepository {
    db: Arc<DatabaseConnection>,
    table: String,
}

impl KnowledgeBaseRepository {
    /// Create a repository over the table created by the migrations.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            table: DEFAULT_KNOWLEDGE_TABLE.to_string(),
        }
    }

    /// Create a repository over a custom table.
    ///
    /// The name is interpolated into SQL, so only `[A-Za-z0-9_]` is accepted.
    pub fn with_table(db: Arc<DatabaseConnection>, table: &str) -> AppResult<Self> {
        if !is_valid_identifier(table) {
            return Err(AppError::Config(format!(
                "invalid knowledge base table name: {table}"
            )));
        }
        Ok(Self {
            db,
            table: table.to_string(),
        })
    }

    /// Name of the backing table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Insert an entry, replacing any existing entry with the same ID.
    pub async fn upsert(&self, entry: &KnowledgeEntry) -> AppResult<()> {
        let sql = format!(
            r"
            INSERT INTO {table} (id, content, metadata, embedding)
            VALUES ($1, $2, $3, $4::vector)
            ON CONFLICT (id) DO UPDATE SET
                content = EXCLUDED.content,
                metadata = EXCLUDED.metadata,
                embedding = EXCLUDED.embedding
            ",
            table = self.table
        );

        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                &sql,
                [
                    entry.id.clone().into(),
                    entry.content.clone().into(),
                    entry.metadata.clone().into(),
                    to_vector_literal(&entry.embedding).into(),
                ],
            ))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Nearest entries by cosine similarity, at or above `threshold`, best first.
    pub async fn search(
        &self,
        embedding: &[f32],
        limit: u64,
        threshold: f64,
    ) -> AppResult<Vec<KnowledgeMatch>> {
        let sql = format!(
            r"
            SELECT id, content, metadata, 1 - (embedding <=> $1::vector) AS similarity
            FROM {table}
            WHERE 1 - (embedding <=> $1::vector) >= $2
            ORDER BY embedding <=> $1::vector
            LIMIT $3
            ",
            table = self.table
        );

        let rows = self
            .db
            .query_all(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                &sql,
                [
                    to_vector_literal(embedding).into(),
                    threshold.into(),
                    (limit as i64).into(),
                ],
            ))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.iter().map(row_to_match).collect()
    }

    /// Delete one entry. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table);
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                &sql,
                [id.into()],
            ))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every entry. Returns the number of rows removed.
    pub async fn delete_all(&self) -> AppResult<u64> {
        let sql = format!("DELETE FROM {}", self.table);
        let result = self
            .db
            .execute(Statement::from_string(DatabaseBackend::Postgres, sql))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Number of stored entries.
    pub async fn count(&self) -> AppResult<u64> {
        let sql = format!("SELECT COUNT(*) AS count FROM {}", self.table);
        let row = self
            .db
            .query_one(Statement::from_string(DatabaseBackend::Postgres, sql))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let count = match row {
            Some(row) => row
                .try_get::<i64>("", "count")
                .map_err(|e| AppError::Database(e.to_string()))?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    /// Declared width of the `embedding` column, if the table exists.
    pub async fn embedding_dimensions(&self) -> AppResult<Option<usize>> {
        // For `vector(N)` columns pg_attribute.atttypmod holds N.
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                r"
                SELECT atttypmod FROM pg_attribute
                WHERE attrelid = to_regclass($1) AND attname = 'embedding'
                ",
                [self.table.clone().into()],
            ))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(row) => {
                let typmod = row
                    .try_get::<i32>("", "atttypmod")
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok((typmod > 0).then_some(typmod as usize))
            }
            None => Ok(None),
        }
    }
}

fn row_to_match(row: &QueryResult) -> AppResult<KnowledgeMatch> {
    let get_err = |e: sea_orm::DbErr| AppError::Database(e.to_string());
    Ok(KnowledgeMatch {
        id: row.try_get("", "id").map_err(get_err)?,
        content: row.try_get("", "content").map_err(get_err)?,
        metadata: row.try_get("", "metadata").map_err(get_err)?,
        similarity: row.try_get("", "similarity").map_err(get_err)?,
    })
}

/// Format an embedding as a pgvector text literal: `[0.1,0.2,0.3]`.
#[must_use]
pub fn to_vector_literal(embedding: &[f32]) -> String {
    let mut literal = String::with_capacity(embedding.len() * 10 + 2);
    literal.push('[');
    for (i, value) in embedding.iter().enumerate() {
        if i > 0 {
            literal.push(',');
        }
        literal.push_str(&value.to_string());
    }
    literal.push(']');
    literal
}

fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use serde_json::json;

    #[test]
    fn test_vector_literal() {
        assert_eq!(to_vector_literal(&[0.5, -1.0, 0.25]), "[0.5,-1,0.25]");
        assert_eq!(to_vector_literal(&[]), "[]");
    }

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_identifier("qa_knowledge_base"));
        assert!(is_valid_identifier("kb2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2kb"));
        assert!(!is_valid_identifier("kb; DROP TABLE user"));
        assert!(!is_valid_identifier("public.kb"));
    }

    #[test]
    fn test_with_table_rejects_bad_name() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let result = KnowledgeBaseRepository::with_table(db, "kb\"--");
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_search_maps_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![
                    btreemap! {
                        "id" => Value::from("q1"),
                        "content" => Value::from("Q: How?\n\nA: Like this."),
                        "metadata" => Value::from(json!({"question_id": "q1"})),
                        "similarity" => Value::from(0.91_f64),
                    },
                    btreemap! {
                        "id" => Value::from("q2"),
                        "content" => Value::from("Q: Why?\n\nA: Because."),
                        "metadata" => Value::from(json!({})),
                        "similarity" => Value::from(0.75_f64),
                    },
                ]])
                .into_connection(),
        );

        let repo = KnowledgeBaseRepository::new(db);
        let matches = repo.search(&[0.1, 0.2], 3, 0.7).await.unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "q1");
        assert!((matches[0].similarity - 0.91).abs() < f64::EPSILON);
        assert_eq!(matches[0].metadata["question_id"], "q1");
    }

    #[tokio::test]
    async fn test_upsert_binds_vector_literal() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = KnowledgeBaseRepository::new(Arc::clone(&db));
        let entry = KnowledgeEntry {
            id: "q1".to_string(),
            content: "Q: a\n\nA: b".to_string(),
            metadata: json!({"status": "Answered"}),
            embedding: vec![1.0, 0.0],
        };
        repo.upsert(&entry).await.unwrap();
        drop(repo);

        let log = format!("{:?}", Arc::try_unwrap(db).ok().unwrap().into_transaction_log());
        assert!(log.contains("ON CONFLICT (id) DO UPDATE"));
        assert!(log.contains("[1,0]"));
    }

    #[tokio::test]
    async fn test_delete_reports_removal() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    },
                ])
                .into_connection(),
        );

        let repo = KnowledgeBaseRepository::new(db);
        assert!(repo.delete("q1").await.unwrap());
        assert!(!repo.delete("q1").await.unwrap());
    }

    #[tokio::test]
    async fn test_count() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![btreemap! { "count" => Value::from(7_i64) }]])
                .into_connection(),
        );

        let repo = KnowledgeBaseRepository::new(db);
        assert_eq!(repo.count().await.unwrap(), 7);
    }
}
