//! Repositories.

pub mod answer;
pub mod knowledge_base;
pub mod question;
pub mod user;

pub use answer::AnswerRepository;
pub use knowledge_base::{KnowledgeBaseRepository, KnowledgeEntry, KnowledgeMatch};
pub use question::QuestionRepository;
pub use user::UserRepository;
