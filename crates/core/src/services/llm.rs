//! Client for OpenAI-compatible HTTP APIs (Groq, `OpenAI`, vLLM, ...).
//!
//! Endpoints are derived from the configured base URL:
//! - POST {base}/v1/chat/completions
//! - POST {base}/v1/embeddings

use std::time::{Duration, Instant};

use async_trait::async_trait;
use qa_common::{AppError, AppResult, config::RagConfig};
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Maximum number of response body characters kept in error messages.
const SNIPPET_LEN: usize = 300;

/// Thin client around an OpenAI-compatible REST API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    url_chat: String,
    url_embeddings: String,
}

/// One chat message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Non-streaming chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<&'a str>,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiClient {
    /// Build a client with a bearer token and a request timeout.
    pub fn new(endpoint: &str, api_key: &str, timeout_secs: u64) -> AppResult<Self> {
        let endpoint = endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(AppError::Config(format!("invalid API endpoint: {endpoint}")));
        }

        let mut headers = header::HeaderMap::new();
        if !api_key.is_empty() {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {api_key}"))
                    .map_err(|e| AppError::Config(format!("invalid API key header: {e}")))?,
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))?;

        let base = endpoint.trim_end_matches('/');
        Ok(Self {
            client,
            url_chat: format!("{base}/v1/chat/completions"),
            url_embeddings: format!("{base}/v1/embeddings"),
        })
    }

    /// Run a chat completion and return the first choice's content, trimmed.
    pub async fn chat(&self, request: &ChatRequest<'_>) -> AppResult<String> {
        let started = Instant::now();
        debug!(model = %request.model, messages = request.messages.len(), "POST {}", self.url_chat);

        let response = self
            .client
            .post(&self.url_chat)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(&self.url_chat, &e))?;

        let response = check_status(&self.url_chat, response, started).await?;

        let body: ChatResponse = response.json().await.map_err(|e| {
            error!(error = %e, url = %self.url_chat, "Failed to decode chat completion response");
            AppError::ExternalService(format!("invalid chat completion response: {e}"))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::ExternalService("chat completion returned no content".into()))
    }

    /// Embed one input string.
    pub async fn embeddings(
        &self,
        model: &str,
        input: &str,
        dimensions: usize,
    ) -> AppResult<Vec<f32>> {
        let started = Instant::now();
        let request = EmbeddingRequest {
            model,
            input,
            dimensions,
        };

        let response = self
            .client
            .post(&self.url_embeddings)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&self.url_embeddings, &e))?;

        let response = check_status(&self.url_embeddings, response, started).await?;

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(error = %e, url = %self.url_embeddings, "Failed to decode embeddings response");
            AppError::ExternalService(format!("invalid embeddings response: {e}"))
        })?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AppError::ExternalService("embeddings response was empty".into()))
    }
}

fn transport_error(url: &str, e: &reqwest::Error) -> AppError {
    let kind = if e.is_timeout() { "timed out" } else { "failed" };
    error!(error = %e, %url, "Request {kind}");
    AppError::ExternalService(format!("request to {url} {kind}: {e}"))
}

async fn check_status(
    url: &str,
    response: reqwest::Response,
    started: Instant,
) -> AppResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let snippet = make_snippet(&text);
    error!(
        %status,
        %url,
        %snippet,
        latency_ms = started.elapsed().as_millis(),
        "Upstream API returned non-success status"
    );
    Err(AppError::ExternalService(format!(
        "{url} returned {status}: {snippet}"
    )))
}

/// Shorten a response body for logs and error messages.
#[must_use]
pub fn make_snippet(text: &str) -> String {
    let mut snippet: String = text.chars().take(SNIPPET_LEN).collect();
    if text.chars().count() > SNIPPET_LEN {
        snippet.push_str("...");
    }
    snippet
}

/// Extract the JSON object from a model reply that may be wrapped in code fences or prose.
#[must_use]
pub fn sanitize_json_block(s: &str) -> String {
    let no_fence = s
        .replace("```json", "")
        .replace("```", "")
        .replace('\u{feff}', "")
        .trim()
        .to_string();

    if let (Some(start), Some(end)) = (no_fence.find('{'), no_fence.rfind('}')) {
        if start < end {
            return no_fence[start..=end].to_string();
        }
    }
    no_fence
}

/// Text generation from a system prompt and a user prompt.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> AppResult<String>;
}

/// [`CompletionClient`] backed by a hosted chat model.
#[derive(Debug, Clone)]
pub struct LlmCompletionClient {
    client: OpenAiClient,
    model: String,
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
    reasoning_effort: Option<String>,
}

impl LlmCompletionClient {
    pub fn new(config: &RagConfig) -> AppResult<Self> {
        Ok(Self {
            client: OpenAiClient::new(
                &config.llm_endpoint,
                &config.llm_api_key,
                config.timeout_secs,
            )?,
            model: config.llm_model.clone(),
            temperature: config.temperature,
            max_completion_tokens: config.max_completion_tokens,
            top_p: config.top_p,
            reasoning_effort: config.reasoning_effort.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for LlmCompletionClient {
    async fn complete(&self, system: &str, prompt: &str) -> AppResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            temperature: self.temperature,
            max_completion_tokens: self.max_completion_tokens,
            top_p: self.top_p,
            reasoning_effort: self.reasoning_effort.as_deref(),
            stream: false,
        };
        self.client.chat(&request).await
    }
}
