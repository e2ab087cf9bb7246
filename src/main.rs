mod config;
mod db;
mod llm;
mod routes;
mod services;
mod state;
mod store;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::llm::LlmChat;
use crate::store::Stores;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();

    let stores = match &config.database_url {
        Some(url) => {
            let pool = db::connect_and_migrate(url, config.db_max_connections).await?;
            tracing::info!("postgres store ready");
            Stores::postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store, data is lost on restart");
            Stores::memory()
        }
    };

    // Non-fatal: /api/ask answers 503 without a model.
    let llm: Option<Arc<dyn LlmChat>> = match llm::LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "LLM client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client not configured; tutoring disabled");
            None
        }
    };

    let port = config.port;
    let state = state::AppState::new(stores, llm, config);

    let _expiry = services::expiry::spawn_expiry_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "lisan listening");
    axum::serve(listener, app).await?;
    Ok(())
}
