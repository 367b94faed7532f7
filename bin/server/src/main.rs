use chatline_ai::{Agent, AnthropicBackend, IdentityTool, TokenCounter, ToolRegistry};
use chatline_conversation::{ConversationStore, HistoryBackend, MemoryBackend, RedisBackend};
use chatline_core::SessionId;
use chatline_server::{
    AppState,
    config::{MemoryBackendKind, ServerConfig},
    router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(error = %e, "no .env file loaded");
    }

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!(?config, "Loaded configuration");

    let backend: Arc<dyn HistoryBackend> = match config.memory_backend {
        MemoryBackendKind::Redis => Arc::new(
            RedisBackend::connect(&config.redis())
                .await
                .expect("failed to connect to redis"),
        ),
        MemoryBackendKind::Memory => {
            tracing::warn!("using in-memory history; it will not survive a restart");
            Arc::new(MemoryBackend::new())
        }
    };
    let store = ConversationStore::with_limit(backend, config.history_limit);

    let llm = AnthropicBackend::new(&config.llm_backend()).expect("failed to build LLM backend");
    let agent = Agent::new(Arc::new(llm))
        .with_tools(ToolRegistry::new().with_tool(IdentityTool))
        .with_config(config.agent());

    let tokens = TokenCounter::new().expect("failed to load tokenizer");

    let default_session = match &config.session_id {
        Some(id) => id.parse::<SessionId>().expect("invalid SESSION_ID"),
        None => SessionId::generate(),
    };
    tracing::info!(session_id = %default_session, "default session");

    let state = Arc::new(AppState::new(store, agent, tokens, default_session));
    let app = router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.bind_address);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
