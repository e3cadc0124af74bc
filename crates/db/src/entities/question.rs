//! Question entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum QuestionStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    /// Flagged by moderation; listed before everything else.
    #[sea_orm(string_value = "Escalated")]
    Escalated,
    #[sea_orm(string_value = "Answered")]
    Answered,
}

/// Action taken by the moderation gate on a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    #[sea_orm(string_value = "allow")]
    Allow,
    #[sea_orm(string_value = "flag")]
    Flag,
    #[sea_orm(string_value = "warn")]
    Warn,
    #[sea_orm(string_value = "ban")]
    Ban,
}

impl ModerationAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Flag => "flag",
            Self::Warn => "warn",
            Self::Ban => "ban",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "question")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(column_type = "Text")]
    pub message: String,

    pub status: QuestionStatus,

    /// Author user ID
    #[sea_orm(indexed)]
    pub user_id: String,

    // Moderation outcome, written once before insert.
    pub classification_label: String,
    pub moderation_action: ModerationAction,
    #[sea_orm(column_type = "Text")]
    pub moderation_reason: String,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,

    #[sea_orm(has_many = "super::answer::Entity")]
    Answers,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::answer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Answers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
