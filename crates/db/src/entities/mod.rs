//! Database entities.

pub mod answer;
pub mod question;
pub mod user;

pub use answer::Entity as Answer;
pub use question::Entity as Question;
pub use user::Entity as User;
