//! HTTP API layer for the Q&A dashboard.
//!
//! - **Endpoints**: auth, questions, admin ingestion, health
//! - **Extractors**: authenticated, optional and admin callers
//! - **Middleware**: bearer token resolution
//! - **Streaming**: live-update WebSocket
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod streaming;

pub use endpoints::router;
pub use streaming::{StreamEvent, StreamingState, streaming_handler};
