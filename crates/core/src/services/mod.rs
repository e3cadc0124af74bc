//! Business logic services.

#![allow(missing_docs)]

pub mod auth;
pub mod classifier;
pub mod embedding;
pub mod event_publisher;
pub mod health;
pub mod knowledge;
pub mod llm;
pub mod moderation;
pub mod question;
pub mod suggestion;

pub use auth::{AuthService, Claims, LoginInput, RegisterInput, TokenResponse, UserDto};
pub use classifier::{Classification, ClassifierService, LlmClassifier, TextClassifier};
pub use embedding::{Embedder, EmbedderService, HttpEmbedder};
pub use event_publisher::{EventPublisher, EventPublisherService, NoOpEventPublisher};
pub use health::{DetailedHealth, HealthService, HealthStatus};
pub use knowledge::{ImportError, ImportOptions, ImportStats, KnowledgeService};
pub use llm::{CompletionClient, LlmCompletionClient, OpenAiClient};
pub use moderation::{ModerationDecision, ModerationService, action_for_label};
pub use question::{
    AnswerDto, CreateAnswerInput, CreateQuestionInput, CreatedAnswer, CreatedQuestion,
    ModerationDto, QuestionDto, QuestionService,
};
pub use suggestion::{Suggestion, SuggestionService, SuggestionSettings, SuggestionSource};
