//! Create the pgvector-backed knowledge base used for suggested answers.

use sea_orm_migration::prelude::*;

/// Table created by this migration.
pub const DEFAULT_KNOWLEDGE_TABLE: &str = "qa_knowledge_base";

/// Width of the `embedding` column created by this migration.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("CREATE EXTENSION IF NOT EXISTS vector;")
            .await?;

        db.execute_unprepared(&format!(
            r"
            CREATE TABLE IF NOT EXISTS {DEFAULT_KNOWLEDGE_TABLE} (
                id VARCHAR(32) PRIMARY KEY,
                content TEXT NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                embedding vector({DEFAULT_EMBEDDING_DIMENSIONS}) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "
        ))
        .await?;

        // HNSW index for cosine distance (`<=>`)
        db.execute_unprepared(&format!(
            r"
            CREATE INDEX IF NOT EXISTS idx_{DEFAULT_KNOWLEDGE_TABLE}_embedding
            ON {DEFAULT_KNOWLEDGE_TABLE}
            USING hnsw (embedding vector_cosine_ops);
            "
        ))
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(&format!("DROP TABLE IF EXISTS {DEFAULT_KNOWLEDGE_TABLE};"))
            .await?;
        Ok(())
    }
}
