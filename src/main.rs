//! Tech Router - two-phase routing assistant
//!
//! A routing agent classifies each request into a technology; a specialist
//! with that technology's instructions then carries the conversation.

mod api;
mod config;
mod conversation;
mod db;
mod llm;
mod prompts;
mod routing;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use llm::{find_model, CompletionClient, LoggingClient, RetryPolicy, RetryingClient, StreamingClient};
use prompts::{FilePromptLoader, PromptLoader};
use runtime::{DatabaseStorage, RuntimeSetup};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tech_router=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Initialize database
    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;
    let history = db.load_history()?;
    let state = db.load_state()?;
    let settings = db.load_settings()?;

    // Routing instructions are read once for the process lifetime
    let prompts = Arc::new(FilePromptLoader::new(&config.prompts_dir));
    let routing_prompt = prompts.routing_prompt().await;
    tracing::info!(
        dir = %prompts.dir().display(),
        chars = routing_prompt.len(),
        "Loaded routing prompt"
    );

    // Completion client
    if config.api_key.is_none() {
        tracing::warn!("No API key configured. Set TECH_ROUTER_API_KEY or DEEPSEEK_API_KEY.");
    }
    if find_model(&config.model).is_none() {
        tracing::warn!(model = %config.model, "Unknown model, sending id verbatim");
    }
    let streaming = StreamingClient::new(
        &config.endpoint,
        config.api_key.clone().unwrap_or_default(),
        &config.model,
    )?;
    let client: Arc<dyn CompletionClient> = if config.max_retries > 0 {
        let policy = RetryPolicy {
            max_retries: config.max_retries,
            ..RetryPolicy::default()
        };
        tracing::info!(max_retries = policy.max_retries, "Retrying transient failures");
        Arc::new(RetryingClient::new(streaming, policy))
    } else {
        Arc::new(streaming)
    };
    let client = Arc::new(LoggingClient::new(client));

    // Start the conversation runtime
    let handle = runtime::start(
        RuntimeSetup {
            state,
            history,
            routing_prompt,
            model_id: config.model.clone(),
            settings,
        },
        DatabaseStorage::new(db),
        client,
        prompts,
    );

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(AppState::new(handle, config.model))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Tech Router server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
