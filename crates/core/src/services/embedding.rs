//! Embedding gateway.

use std::sync::Arc;

use async_trait::async_trait;
use qa_common::{AppError, AppResult, config::RagConfig};

use super::llm::OpenAiClient;

/// Turns text into a fixed-width vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;

    /// Width of every vector returned by [`Embedder::embed`].
    fn dimensions(&self) -> usize;
}

pub type EmbedderService = Arc<dyn Embedder>;

/// Embedder backed by an `/v1/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: OpenAiClient,
    model: String,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(config: &RagConfig) -> AppResult<Self> {
        Ok(Self {
            client: OpenAiClient::new(
                &config.embedding_endpoint,
                &config.embedding_api_key,
                config.timeout_secs,
            )?,
            model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let input = normalize_input(text)?;
        let vector = self
            .client
            .embeddings(&self.model, &input, self.dimensions)
            .await?;
        check_dimensions(vector, self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Collapse newlines and surrounding whitespace; empty input is rejected.
pub fn normalize_input(text: &str) -> AppResult<String> {
    let normalized = text
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if normalized.is_empty() {
        return Err(AppError::BadRequest("cannot embed empty text".to_string()));
    }
    Ok(normalized)
}

fn check_dimensions(vector: Vec<f32>, expected: usize) -> AppResult<Vec<f32>> {
    if vector.len() == expected {
        Ok(vector)
    } else {
        Err(AppError::ExternalService(format!(
            "embedding size mismatch: expected {expected}, got {}",
            vector.len()
        )))
    }
}
