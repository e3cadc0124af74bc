//! Q&A dashboard server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, bail};
use axum::{
    Json, Router,
    http::HeaderValue,
    middleware,
    routing::get,
};
use qa_api::{StreamingState, middleware::AppState, router as api_router};
use qa_common::Config;
use qa_core::{
    AuthService, HealthService, HttpEmbedder, KnowledgeService, LlmClassifier,
    LlmCompletionClient, ModerationService, QuestionService, SuggestionService,
    SuggestionSettings,
};
use qa_db::repositories::{
    AnswerRepository, KnowledgeBaseRepository, QuestionRepository, UserRepository,
};
use serde_json::json;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin: {o}")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(layer.allow_origin(origins))
}

/// Suggestion and knowledge services, when suggested answers are enabled.
fn rag_services(
    config: &Config,
    knowledge_repo: &KnowledgeBaseRepository,
    question_repo: &QuestionRepository,
    answer_repo: &AnswerRepository,
) -> anyhow::Result<Option<(SuggestionService, KnowledgeService)>> {
    if !config.rag.enabled {
        info!("Suggested answers disabled");
        return Ok(None);
    }

    let embedder = Arc::new(HttpEmbedder::new(&config.rag)?);
    let completion = Arc::new(LlmCompletionClient::new(&config.rag)?);

    let suggestion = SuggestionService::new(
        embedder.clone(),
        knowledge_repo.clone(),
        completion,
        SuggestionSettings::from(&config.rag),
    );
    let knowledge = KnowledgeService::new(
        embedder,
        knowledge_repo.clone(),
        question_repo.clone(),
        answer_repo.clone(),
    );
    Ok(Some((suggestion, knowledge)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "qa_server=debug,qa_api=debug,qa_core=debug,tower_http=debug".into()
            }),
        )
        .init();

    info!("Starting Q&A dashboard server...");

    let config = Config::load()?;

    let db = qa_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    qa_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);

    // Repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let question_repo = QuestionRepository::new(Arc::clone(&db));
    let answer_repo = AnswerRepository::new(Arc::clone(&db));
    let knowledge_repo =
        KnowledgeBaseRepository::with_table(Arc::clone(&db), &config.rag.vector_table)?;

    if config.rag.enabled {
        match knowledge_repo.embedding_dimensions().await? {
            Some(dims) if dims != config.rag.embedding_dimensions => bail!(
                "knowledge table {} stores vector({dims}) but rag.embedding_dimensions is {}",
                knowledge_repo.table(),
                config.rag.embedding_dimensions
            ),
            Some(_) => {}
            None => warn!(table = knowledge_repo.table(), "Knowledge table not found"),
        }
    }

    // Services
    let auth_service = AuthService::new(user_repo.clone(), &config.auth);
    let classifier = Arc::new(LlmClassifier::new(&config.moderation)?);
    let moderation_service = ModerationService::new(classifier, user_repo.clone());
    let streaming = StreamingState::new();

    let mut question_service = QuestionService::new(
        question_repo.clone(),
        answer_repo.clone(),
        user_repo,
        moderation_service,
    );
    question_service.set_event_publisher(Arc::new(streaming.clone()));

    let rag = rag_services(&config, &knowledge_repo, &question_repo, &answer_repo)?;
    let knowledge_service = rag.map(|(suggestion, knowledge)| {
        question_service.set_suggestion_service(suggestion);
        question_service.set_knowledge_service(knowledge.clone());
        info!(model = %config.rag.llm_model, "Suggested answers enabled");
        knowledge
    });

    let state = AppState {
        auth_service,
        question_service,
        knowledge_service,
        health_service: HealthService::new(Arc::clone(&db), config.server.clone()),
        streaming,
    };

    let project_name = config.server.project_name.clone();
    let app = Router::new()
        .route(
            "/",
            get(move || {
                let message = format!("Welcome to {project_name}");
                async move {
                    Json(json!({
                        "message": message,
                        "version": env!("CARGO_PKG_VERSION"),
                        "status": "running",
                    }))
                }
            }),
        )
        .nest(&config.server.api_prefix, api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            qa_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server.cors_origins)?)
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.server.host, config.server.port))?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
