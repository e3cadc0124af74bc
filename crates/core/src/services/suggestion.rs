//! Suggested answers composed from prior Q&A pairs (retrieval-augmented generation).
//!
//! Flow: embed the question, fetch the nearest knowledge base entries above the
//! similarity threshold, ask the completion model for an answer grounded in
//! them, and emit the result only when its confidence clears the threshold.

use std::fmt::Write as _;
use std::sync::Arc;

use qa_common::{AppResult, config::RagConfig};
use qa_db::repositories::{KnowledgeBaseRepository, KnowledgeMatch};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::embedding::EmbedderService;
use super::llm::CompletionClient;

/// Characters of source content kept in a suggestion.
const SOURCE_SNIPPET_CHARS: usize = 200;

const SYSTEM_PROMPT: &str = "\
You are an assistant for a Q&A forum. Compose a helpful answer to the user's question \
using only the reference Q&A pairs retrieved from the forum's knowledge base.

Guidelines:
1. Keep the answer clear and concise.
2. Support the answer only with the provided references; they were retrieved by semantic \
similarity and may be incomplete or partly irrelevant.
3. Never invent facts that are not in the references.
4. If the references are insufficient, say so plainly.
5. Keep a friendly, professional tone suited to a forum reply.";

/// A transient machine-suggested answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub answer: String,
    /// Mean similarity of the references used, in `0.0..=1.0`.
    pub confidence: f64,
    pub sources: Vec<SuggestionSource>,
}

/// A knowledge base entry a suggestion was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionSource {
    pub id: String,
    pub content: String,
    pub similarity: f64,
}

impl From<&KnowledgeMatch> for SuggestionSource {
    fn from(m: &KnowledgeMatch) -> Self {
        Self {
            id: m.id.clone(),
            content: snippet(&m.content),
            similarity: m.similarity,
        }
    }
}

/// Retrieval and emission knobs.
#[derive(Debug, Clone, Copy)]
pub struct SuggestionSettings {
    pub retrieval_limit: u64,
    pub similarity_threshold: f64,
    pub suggestion_threshold: f64,
}

impl From<&RagConfig> for SuggestionSettings {
    fn from(config: &RagConfig) -> Self {
        Self {
            retrieval_limit: config.retrieval_limit,
            similarity_threshold: config.similarity_threshold,
            suggestion_threshold: config.suggestion_threshold,
        }
    }
}

/// Suggestion service.
#[derive(Clone)]
pub struct SuggestionService {
    embedder: EmbedderService,
    knowledge_repo: KnowledgeBaseRepository,
    completion: Arc<dyn CompletionClient>,
    settings: SuggestionSettings,
}

impl SuggestionService {
    #[must_use]
    pub fn new(
        embedder: EmbedderService,
        knowledge_repo: KnowledgeBaseRepository,
        completion: Arc<dyn CompletionClient>,
        settings: SuggestionSettings,
    ) -> Self {
        Self {
            embedder,
            knowledge_repo,
            completion,
            settings,
        }
    }

    /// Nearest knowledge base entries for a question.
    pub async fn retrieve(&self, question: &str) -> AppResult<Vec<KnowledgeMatch>> {
        let embedding = self.embedder.embed(question).await?;
        self.knowledge_repo
            .search(
                &embedding,
                self.settings.retrieval_limit,
                self.settings.similarity_threshold,
            )
            .await
    }

    /// Compose a suggestion, propagating gateway errors.
    ///
    /// Returns `None` when nothing relevant was retrieved or confidence is too low.
    pub async fn compose(&self, question: &str) -> AppResult<Option<Suggestion>> {
        let contexts = self.retrieve(question).await?;
        if contexts.is_empty() {
            debug!("No knowledge base context above threshold");
            return Ok(None);
        }

        let confidence = confidence(&contexts);
        if !should_emit(confidence, self.settings.suggestion_threshold) {
            debug!(confidence, "Suggestion below confidence threshold");
            return Ok(None);
        }

        let prompt = build_prompt(question, &contexts);
        let answer = self.completion.complete(SYSTEM_PROMPT, &prompt).await?;

        Ok(Some(Suggestion {
            answer,
            confidence,
            sources: contexts.iter().map(SuggestionSource::from).collect(),
        }))
    }

    /// Like [`Self::compose`], but failures degrade to no suggestion.
    pub async fn suggest(&self, question: &str) -> Option<Suggestion> {
        match self.compose(question).await {
            Ok(suggestion) => suggestion,
            Err(e) => {
                warn!(error = %e, "Suggestion unavailable");
                None
            }
        }
    }
}

/// Mean similarity of the retrieved contexts, capped at 1.0. Zero when empty.
#[must_use]
pub fn confidence(contexts: &[KnowledgeMatch]) -> f64 {
    if contexts.is_empty() {
        return 0.0;
    }
    let sum: f64 = contexts.iter().map(|c| c.similarity).sum();
    (sum / contexts.len() as f64).clamp(0.0, 1.0)
}

/// A suggestion is emitted only when confidence is strictly above the threshold.
#[must_use]
pub fn should_emit(confidence: f64, threshold: f64) -> bool {
    confidence > threshold
}

fn snippet(content: &str) -> String {
    if content.chars().count() > SOURCE_SNIPPET_CHARS {
        let mut s: String = content.chars().take(SOURCE_SNIPPET_CHARS).collect();
        s.push_str("...");
        s
    } else {
        content.to_string()
    }
}

fn format_context(contexts: &[KnowledgeMatch]) -> String {
    let mut out = String::new();
    for (i, ctx) in contexts.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(
            out,
            "--- Reference {} (Relevance: {:.1}%) ---\n{}",
            i + 1,
            ctx.similarity * 100.0,
            ctx.content
        );
    }
    out
}

fn build_prompt(question: &str, contexts: &[KnowledgeMatch]) -> String {
    format!(
        "User's question:\n{question}\n\n\
         Relevant Q&A pairs from the knowledge base:\n{context}\n\
         Instructions:\n\
         1. Answer as a short bullet list, at most 500 words in total.\n\
         2. If only one point applies, use a single short bullet.\n\
         3. Combine partial context where possible, without speculating.\n\
         4. If the context is insufficient, say so clearly.\n\n\
         Your answer:",
        context = format_context(contexts)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use maplit::btreemap;
    use qa_common::AppError;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::services::embedding::Embedder;

    pub struct FakeEmbedder {
        pub fail: bool,
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, _text: &str) -> AppResult<Vec<f32>> {
            if self.fail {
                Err(AppError::ExternalService("embeddings down".to_string()))
            } else {
                Ok(vec![0.1, 0.2, 0.3])
            }
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    #[derive(Default)]
    pub struct FakeCompletion {
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionClient for FakeCompletion {
        async fn complete(&self, _system: &str, prompt: &str) -> AppResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::ExternalService("llm down".to_string()));
            }
            assert!(prompt.contains("--- Reference 1"));
            Ok("- Use the reset link on the login page.".to_string())
        }
    }

    fn knowledge_row(id: &str, similarity: f64) -> std::collections::BTreeMap<&'static str, Value> {
        btreemap! {
            "id" => Value::from(id),
            "content" => Value::from(format!("Q: question {id}\n\nA: answer {id}")),
            "metadata" => Value::from(json!({ "question_id": id })),
            "similarity" => Value::from(similarity),
        }
    }

    fn kb_match(similarity: f64) -> KnowledgeMatch {
        KnowledgeMatch {
            id: "q".to_string(),
            content: "c".to_string(),
            metadata: json!({}),
            similarity,
        }
    }

    const SETTINGS: SuggestionSettings = SuggestionSettings {
        retrieval_limit: 3,
        similarity_threshold: 0.5,
        suggestion_threshold: 0.6,
    };

    fn service(
        db: MockDatabase,
        embed_fail: bool,
        completion: Arc<FakeCompletion>,
    ) -> SuggestionService {
        SuggestionService::new(
            Arc::new(FakeEmbedder { fail: embed_fail }),
            KnowledgeBaseRepository::new(Arc::new(db.into_connection())),
            completion,
            SETTINGS,
        )
    }

    #[test]
    fn test_confidence_is_mean_similarity() {
        let c = confidence(&[kb_match(0.9), kb_match(0.7)]);
        assert!((c - 0.8).abs() < 1e-9);
        assert!(confidence(&[]).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_is_capped() {
        assert!((confidence(&[kb_match(1.2)]) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_emission_boundary_is_strict() {
        assert!(!should_emit(0.6, 0.6));
        assert!(should_emit(0.600_001, 0.6));
        assert!(!should_emit(0.59, 0.6));
    }

    #[test]
    fn test_snippet_truncates_long_content() {
        let long = "a".repeat(250);
        let s = snippet(&long);
        assert_eq!(s.chars().count(), SOURCE_SNIPPET_CHARS + 3);
        assert!(s.ends_with("..."));
        assert_eq!(snippet("short"), "short");
    }

    #[test]
    fn test_format_context_numbers_references() {
        let ctx = format_context(&[kb_match(0.876), kb_match(0.7)]);
        assert!(ctx.contains("--- Reference 1 (Relevance: 87.6%) ---"));
        assert!(ctx.contains("--- Reference 2 (Relevance: 70.0%) ---"));
    }

    #[tokio::test]
    async fn test_compose_above_threshold() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![knowledge_row("q1", 0.9), knowledge_row("q2", 0.8)]]);
        let completion = Arc::new(FakeCompletion::default());
        let svc = service(db, false, Arc::clone(&completion));

        let suggestion = svc.compose("How do I reset?").await.unwrap().unwrap();

        assert!((suggestion.confidence - 0.85).abs() < 1e-9);
        assert_eq!(suggestion.sources.len(), 2);
        assert_eq!(suggestion.sources[0].id, "q1");
        assert_eq!(completion.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_compose_below_threshold_skips_llm() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![knowledge_row("q1", 0.6), knowledge_row("q2", 0.55)]]);
        let completion = Arc::new(FakeCompletion::default());
        let svc = service(db, false, Arc::clone(&completion));

        assert!(svc.compose("How?").await.unwrap().is_none());
        assert_eq!(completion.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_compose_without_context() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<std::collections::BTreeMap<&str, Value>>::new()]);
        let completion = Arc::new(FakeCompletion::default());
        let svc = service(db, false, completion);

        assert!(svc.compose("How?").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_suggest_degrades_on_embedding_failure() {
        let completion = Arc::new(FakeCompletion::default());
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres), true, completion);

        assert!(svc.compose("How?").await.is_err());
        assert!(svc.suggest("How?").await.is_none());
    }

    #[tokio::test]
    async fn test_suggest_degrades_on_llm_failure() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![knowledge_row("q1", 0.95)]]);
        let completion = Arc::new(FakeCompletion {
            fail: true,
            ..FakeCompletion::default()
        });
        let svc = service(db, false, completion);

        assert!(svc.suggest("How?").await.is_none());
    }
}
