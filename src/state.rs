//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! Everything lives in memory: the user directory, the session store, the
//! quiz attempts and the rate-limit windows. The LLM client is optional so
//! the server still boots (and serves auth) without provider credentials.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::llm::LlmChat;
use crate::rate_limit::RateLimiter;
use crate::services::directory::Directory;
use crate::services::quiz::AttemptStore;
use crate::services::session::SessionStore;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub directory: Arc<RwLock<Directory>>,
    pub sessions: SessionStore,
    pub attempts: AttemptStore,
    /// Optional LLM client. None if provider credentials are not configured.
    pub llm: Option<Arc<dyn LlmChat>>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, directory: Directory, llm: Option<Arc<dyn LlmChat>>, rate_limiter: RateLimiter) -> Self {
        Self {
            sessions: SessionStore::new(config.session_ttl),
            config,
            directory: Arc::new(RwLock::new(directory)),
            attempts: AttemptStore::new(),
            llm,
            rate_limiter,
        }
    }
}
