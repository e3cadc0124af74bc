//! Create answer table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Answer::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Answer::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Answer::QuestionId).string_len(32).not_null())
                    .col(ColumnDef::new(Answer::Message).text().not_null())
                    .col(ColumnDef::new(Answer::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Answer::ClassificationLabel)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Answer::ModerationAction).string_len(8).not_null())
                    .col(ColumnDef::new(Answer::ModerationReason).text().not_null())
                    .col(
                        ColumnDef::new(Answer::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (question_id, created_at) for answer threads
        manager
            .create_index(
                Index::create()
                    .name("idx_answer_question_id_created_at")
                    .table(Answer::Table)
                    .col(Answer::QuestionId)
                    .col(Answer::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_foreign_key(
                ForeignKey::create()
                    .name("fk_answer_question_id")
                    .from(Answer::Table, Answer::QuestionId)
                    .to(Question::Table, Question::Id)
                    .on_delete(ForeignKeyAction::Cascade)
                    .to_owned(),
            )
            .await?;

        manager
            .create_foreign_key(
                ForeignKey::create()
                    .name("fk_answer_user_id")
                    .from(Answer::Table, Answer::UserId)
                    .to(User::Table, User::Id)
                    .on_delete(ForeignKeyAction::Cascade)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Answer::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Answer {
    Table,
    Id,
    QuestionId,
    Message,
    UserId,
    ClassificationLabel,
    ModerationAction,
    ModerationReason,
    CreatedAt,
}

#[derive(Iden)]
enum Question {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
