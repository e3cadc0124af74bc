//! Moderation gate: classifier verdict, fixed policy table and user sanction.

use qa_common::{AppError, AppResult};
use qa_db::{
    entities::{question::ModerationAction, user},
    repositories::UserRepository,
};
use serde::Serialize;
use tracing::{info, warn};

use super::auth::is_guest;
use super::classifier::{Classification, ClassifierService};

/// Label -> action policy. Labels not listed here map to [`ModerationAction::Flag`].
pub const POLICY_TABLE: [(&str, ModerationAction); 11] = [
    ("SAFE", ModerationAction::Allow),
    ("HATE_SPEECH", ModerationAction::Flag),
    ("ABUSIVE_LANGUAGE", ModerationAction::Ban),
    ("SEXUAL_CONTENT", ModerationAction::Ban),
    ("SEXUAL_CONTENT_MINORS", ModerationAction::Ban),
    ("VIOLENCE", ModerationAction::Flag),
    ("SELF_HARM", ModerationAction::Flag),
    ("ILLEGAL_ACTIVITY", ModerationAction::Flag),
    ("SPAM", ModerationAction::Ban),
    ("MISINFORMATION", ModerationAction::Warn),
    ("SENSITIVE_POLITICAL", ModerationAction::Flag),
];

/// Look up the action for a classifier label.
#[must_use]
pub fn action_for_label(label: &str) -> ModerationAction {
    POLICY_TABLE
        .iter()
        .find(|(l, _)| *l == label)
        .map_or(ModerationAction::Flag, |(_, action)| *action)
}

/// Policy wording used when the classifier gives no reason.
#[must_use]
pub const fn policy_reason(action: ModerationAction) -> &'static str {
    match action {
        ModerationAction::Allow => "Content is safe",
        ModerationAction::Flag => "Content flagged for moderator review",
        ModerationAction::Warn => "Content may contain misleading information",
        ModerationAction::Ban => "Content violates community guidelines",
    }
}

/// Outcome of running a submission through the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModerationDecision {
    pub label: String,
    pub action: ModerationAction,
    pub reason: String,
}

impl From<Classification> for ModerationDecision {
    fn from(classification: Classification) -> Self {
        let action = action_for_label(&classification.label);
        let reason = if classification.reason.is_empty() {
            policy_reason(action).to_string()
        } else {
            classification.reason
        };
        Self {
            label: classification.label,
            action,
            reason,
        }
    }
}

/// Moderation service.
#[derive(Clone)]
pub struct ModerationService {
    classifier: ClassifierService,
    user_repo: UserRepository,
}

impl ModerationService {
    #[must_use]
    pub fn new(classifier: ClassifierService, user_repo: UserRepository) -> Self {
        Self {
            classifier,
            user_repo,
        }
    }

    /// Classify text and apply the policy table. Classifier errors propagate.
    pub async fn review(&self, text: &str) -> AppResult<ModerationDecision> {
        let classification = self.classifier.classify(text).await?;
        Ok(ModerationDecision::from(classification))
    }

    /// Review a submission by `author`.
    ///
    /// A `ban` decision deactivates the author and returns
    /// [`AppError::ContentRejected`]; the caller must not persist anything.
    /// The shared guest account is never deactivated, only its content is rejected.
    pub async fn enforce(&self, author: &user::Model, text: &str) -> AppResult<ModerationDecision> {
        let decision = self.review(text).await?;
        let author_id = author.id.as_str();

        match decision.action {
            ModerationAction::Ban => {
                if is_guest(author) {
                    warn!(
                        user_id = %author_id,
                        label = %decision.label,
                        "Anonymous submission banned"
                    );
                } else {
                    self.user_repo.deactivate(author_id).await?;
                    warn!(
                        user_id = %author_id,
                        label = %decision.label,
                        "Submission banned, author deactivated"
                    );
                }
                Err(AppError::ContentRejected {
                    label: decision.label,
                    reason: decision.reason,
                })
            }
            ModerationAction::Flag | ModerationAction::Warn => {
                info!(
                    user_id = %author_id,
                    label = %decision.label,
                    action = decision.action.as_str(),
                    "Submission accepted with moderation action"
                );
                Ok(decision)
            }
            ModerationAction::Allow => Ok(decision),
        }
    }
}
