//! Create question table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Question::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Question::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Question::Message).text().not_null())
                    .col(
                        ColumnDef::new(Question::Status)
                            .string_len(16)
                            .not_null()
                            .default("Pending"),
                    )
                    .col(ColumnDef::new(Question::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Question::ClassificationLabel)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Question::ModerationAction)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Question::ModerationReason).text().not_null())
                    .col(
                        ColumnDef::new(Question::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Question::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_question_user_id")
                    .table(Question::Table)
                    .col(Question::UserId)
                    .to_owned(),
            )
            .await?;

        // Listing sorts escalated questions first, then newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_question_status_created_at")
                    .table(Question::Table)
                    .col(Question::Status)
                    .col(Question::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_foreign_key(
                ForeignKey::create()
                    .name("fk_question_user_id")
                    .from(Question::Table, Question::UserId)
                    .to(User::Table, User::Id)
                    .on_delete(ForeignKeyAction::Cascade)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Question::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Question {
    Table,
    Id,
    Message,
    Status,
    UserId,
    ClassificationLabel,
    ModerationAction,
    ModerationReason,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
