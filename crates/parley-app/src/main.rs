//! Parley application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML + environment
//! 2. Open the SQLite conversation store
//! 3. Build the upstream clients (Gemini, web search, news)
//! 4. Wire the chat orchestrator and session table
//! 5. Serve the axum REST API until Ctrl-C

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use parley_api::{routes, AppState, SessionTable};
use parley_chat::{
    ChatOrchestrator, DuckDuckGoSearch, GeminiClient, GoogleNewsFeed, PromptAugmenter,
    ReplyGenerator,
};
use parley_core::ParleyConfig;
use parley_storage::{ConversationStore, Database, SqliteConversationStore};

use cli::{expand_home, CliArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = ParleyConfig::load_or_default(&config_file);
    config.apply_env_overrides();
    config.general.port = args.resolve_port(config.general.port);
    config.general.log_level = args.resolve_log_level(&config.general.log_level);

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Parley v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    if config.llm.api_key.is_none() {
        tracing::warn!("No Gemini API key configured; model replies will fail");
    }

    // Storage.
    let data_dir = args.resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join(&config.storage.database_file);
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    let store: Arc<dyn ConversationStore> = Arc::new(SqliteConversationStore::new(db));

    // Upstream clients.
    let search_timeout = Duration::from_secs(config.search.timeout_secs);
    let web_search = Arc::new(DuckDuckGoSearch::new(
        config.search.web_search_url.clone(),
        search_timeout,
    ));
    let news = Arc::new(GoogleNewsFeed::new(
        config.search.news_url.clone(),
        search_timeout,
    ));
    let gemini = Arc::new(GeminiClient::from_config(&config.llm));

    let replies = ReplyGenerator::from_config(gemini, &config.llm);
    tracing::info!(model = %replies.default_model(), "Reply generator ready");

    let public_dir = expand_home(&config.storage.public_dir);
    let chat = ChatOrchestrator::new(
        Arc::clone(&store),
        replies,
        PromptAugmenter::new(web_search, config.search.prompt_result_limit),
        news,
        config.search.news_limit,
        public_dir,
    );

    let sessions = SessionTable::from_config(&config.auth, &data_dir);

    // API server.
    let state = AppState::new(config.clone(), store, chat, sessions);
    routes::start_server(&config, state).await?;

    tracing::info!("Parley stopped");
    Ok(())
}
