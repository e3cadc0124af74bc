//! Classification gateway: sends user text to an external classifier.

use std::sync::Arc;

use async_trait::async_trait;
use qa_common::{AppError, AppResult, config::ModerationConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::llm::{ChatMessage, ChatRequest, OpenAiClient, sanitize_json_block};

const SYSTEM_PROMPT: &str = "\
You are a strict content moderation classifier. Given user text, return a JSON object with:
- label: one of [SAFE, HATE_SPEECH, ABUSIVE_LANGUAGE, SEXUAL_CONTENT, SEXUAL_CONTENT_MINORS, VIOLENCE, SELF_HARM, ILLEGAL_ACTIVITY, SPAM, MISINFORMATION, SENSITIVE_POLITICAL]
- reason: brief explanation (max 25 words)

Rules:
- SEXUAL_CONTENT_MINORS is a hard block for any sexual context involving minors.
- If unsure between safe and unsafe, pick the unsafe category.
- Output only the JSON object.";

/// Raw classifier verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Upper-cased label, e.g. `SAFE` or `SPAM`.
    pub label: String,
    pub reason: String,
}

/// Something that can label a piece of text.
///
/// Any failure must surface as an error; callers treat errors as "do not accept".
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> AppResult<Classification>;
}

pub type ClassifierService = Arc<dyn TextClassifier>;

/// Classifier backed by a hosted chat model that answers in JSON.
#[derive(Debug, Clone)]
pub struct LlmClassifier {
    client: OpenAiClient,
    model: String,
}

impl LlmClassifier {
    pub fn new(config: &ModerationConfig) -> AppResult<Self> {
        Ok(Self {
            client: OpenAiClient::new(&config.endpoint, &config.api_key, config.timeout_secs)?,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextClassifier for LlmClassifier {
    async fn classify(&self, text: &str) -> AppResult<Classification> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!("Classify this text:\n\"\"\"{}\"\"\"", text.trim())),
            ],
            temperature: 0.0,
            max_completion_tokens: 300,
            top_p: 1.0,
            reasoning_effort: None,
            stream: false,
        };

        let raw = self.client.chat(&request).await?;
        let classification = parse_classification(&raw)?;
        debug!(label = %classification.label, "Text classified");
        Ok(classification)
    }
}

#[derive(Deserialize)]
struct RawClassification {
    label: String,
    #[serde(default)]
    reason: String,
}

/// Parse a classifier reply into a [`Classification`].
pub fn parse_classification(raw: &str) -> AppResult<Classification> {
    let json = sanitize_json_block(raw);
    let parsed: RawClassification = serde_json::from_str(&json).map_err(|e| {
        warn!(error = %e, reply = %super::llm::make_snippet(raw), "Unparseable classifier reply");
        AppError::ExternalService(format!("unparseable classifier reply: {e}"))
    })?;

    let label = parsed.label.trim().to_uppercase();
    if label.is_empty() {
        return Err(AppError::ExternalService(
            "classifier returned an empty label".to_string(),
        ));
    }

    Ok(Classification {
        label,
        reason: parsed.reason.trim().to_string(),
    })
}
