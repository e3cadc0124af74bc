//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Prefix for environment overrides, e.g. `QA__DATABASE__URL`.
const ENV_PREFIX: &str = "QA";

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Content moderation configuration.
    pub moderation: ModerationConfig,
    /// Suggested-answer (retrieval + completion) configuration.
    #[serde(default)]
    pub rag: RagConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Human-readable service name reported by the health endpoints.
    #[serde(default = "default_project_name")]
    pub project_name: String,
    /// Deployment environment label (`development`, `production`, ...).
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Prefix all REST routes are nested under.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Access token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret.
    pub secret_key: String,
    /// Access token lifetime.
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
}

/// External text classifier configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationConfig {
    /// Base URL of an OpenAI-compatible chat completion API.
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    /// Bearer token for the classifier.
    #[serde(default)]
    pub api_key: String,
    /// Model used for classification.
    #[serde(default = "default_moderation_model")]
    pub model: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Retrieval-augmented suggestion configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RagConfig {
    /// Whether suggestions are generated at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    // Completion
    #[serde(default = "default_llm_endpoint")]
    pub llm_endpoint: String,
    #[serde(default)]
    pub llm_api_key: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Forwarded as `reasoning_effort` when set.
    #[serde(default)]
    pub reasoning_effort: Option<String>,

    // Embeddings
    #[serde(default = "default_embedding_endpoint")]
    pub embedding_endpoint: String,
    #[serde(default)]
    pub embedding_api_key: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Must match the `vector(N)` column of the knowledge table.
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // Retrieval
    #[serde(default = "default_vector_table")]
    pub vector_table: String,
    #[serde(default = "default_retrieval_limit")]
    pub retrieval_limit: u64,
    /// Minimum cosine similarity for a knowledge entry to be used as context.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// A suggestion is emitted only when its confidence is strictly above this.
    #[serde(default = "default_suggestion_threshold")]
    pub suggestion_threshold: f64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            llm_endpoint: default_llm_endpoint(),
            llm_api_key: String::new(),
            llm_model: default_llm_model(),
            temperature: default_temperature(),
            max_completion_tokens: default_max_completion_tokens(),
            top_p: default_top_p(),
            reasoning_effort: None,
            embedding_endpoint: default_embedding_endpoint(),
            embedding_api_key: String::new(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            timeout_secs: default_timeout_secs(),
            vector_table: default_vector_table(),
            retrieval_limit: default_retrieval_limit(),
            similarity_threshold: default_similarity_threshold(),
            suggestion_threshold: default_suggestion_threshold(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8000
}

fn default_project_name() -> String {
    "Q&A Dashboard API".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_token_ttl_minutes() -> i64 {
    30
}

fn default_llm_endpoint() -> String {
    "https://api.groq.com/openai".to_string()
}

fn default_moderation_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_temperature() -> f32 {
    0.3
}

const fn default_max_completion_tokens() -> u32 {
    1024
}

const fn default_top_p() -> f32 {
    1.0
}

fn default_embedding_endpoint() -> String {
    "https://api.openai.com".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

const fn default_embedding_dimensions() -> usize {
    384
}

fn default_vector_table() -> String {
    "qa_knowledge_base".to_string()
}

const fn default_retrieval_limit() -> u64 {
    3
}

const fn default_similarity_threshold() -> f64 {
    0.7
}

const fn default_suggestion_threshold() -> f64 {
    0.6
}

const fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (via dotenvy, if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `QA_ENV`)
    /// 4. Environment variables with `QA__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        // A missing .env file is the normal case outside development.
        let _ = dotenvy::dotenv();

        let env = std::env::var("QA_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Build a configuration from an in-memory TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [server]

        [database]
        url = "postgres://localhost/qa"

        [auth]
        secret_key = "test-secret"

        [moderation]
        api_key = "gsk-test"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.api_prefix, "/api/v1");
        assert!(config.server.cors_origins.is_empty());
        assert_eq!(config.auth.token_ttl_minutes, 30);
        assert_eq!(config.moderation.timeout_secs, 30);
        assert!(config.rag.enabled);
        assert_eq!(config.rag.retrieval_limit, 3);
        assert_eq!(config.rag.similarity_threshold, 0.7);
        assert_eq!(config.rag.suggestion_threshold, 0.6);
        assert_eq!(config.rag.vector_table, "qa_knowledge_base");
    }

    #[test]
    fn test_rag_overrides() {
        let source = format!(
            "{MINIMAL}\n[rag]\nenabled = false\nretrieval_limit = 5\nsuggestion_threshold = 0.8\nreasoning_effort = \"low\"\n"
        );
        let config = Config::from_toml_str(&source).unwrap();

        assert!(!config.rag.enabled);
        assert_eq!(config.rag.retrieval_limit, 5);
        assert_eq!(config.rag.suggestion_threshold, 0.8);
        assert_eq!(config.rag.reasoning_effort.as_deref(), Some("low"));
        // Untouched keys keep their defaults.
        assert_eq!(config.rag.embedding_dimensions, 384);
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let source = r#"
            [server]
            [database]
            url = "postgres://localhost/qa"
            [auth]
            [moderation]
        "#;
        assert!(Config::from_toml_str(source).is_err());
    }
}
