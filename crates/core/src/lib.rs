//! Core business logic for the Q&A dashboard.

pub mod services;

pub use services::*;
