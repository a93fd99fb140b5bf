mod config;
mod error;
mod llm;
mod rate_limit;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use llm::LlmChat;
use services::directory::{Directory, PasswordPolicy};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env();
    let directory = Directory::seeded(PasswordPolicy::default())?;

    // Initialize LLM client (non-fatal: generation disabled if config missing).
    let llm: Option<Arc<dyn LlmChat>> = match llm::LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "LLM client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client not configured; generation endpoints will answer 503");
            None
        }
    };

    let rate_limiter = rate_limit::RateLimiter::new(rate_limit::RateLimitConfig::from_env());
    let state = state::AppState::new(config, directory, llm, rate_limiter);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;

    tracing::info!(port = config.port, "eduzen listening");
    axum::serve(listener, app).await?;
    Ok(())
}
