use anyhow::Context;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use dataset_qa_backend::api;
use dataset_qa_backend::config::Config;
use dataset_qa_backend::services::LlmService;
use dataset_qa_backend::storage::SessionStore;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (also reads .env)
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    let engine = LlmService::new(&config);
    if !engine.is_configured() {
        warn!("LLM_GATEWAY_URL is not set; only simple lookups will be answered");
    }

    let sessions = Arc::new(SessionStore::from_config(&config.session));
    let sweeper = sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.purge_expired();
        }
    });

    let app: Router = api::routes::create_router_with_state(config.clone(), sessions, Arc::new(engine));

    let addr = config.socket_addr()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
