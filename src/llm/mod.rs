//! LLM: Gemini-backed chat client for notes and test generation.
//!
//! DESIGN
//! ======
//! Everything above this module talks to the `LlmChat` trait, so tests swap
//! in a mock without touching the network. `LlmClient` is the production
//! implementation and owns the model name it was configured with.

pub mod config;
pub mod gemini;
pub mod types;

use std::time::Duration;

use config::{LlmConfig, LlmTimeouts};
pub use types::LlmChat;
use types::{ChatResponse, LlmError, Message};

fn build_http_client(timeouts: LlmTimeouts) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeouts.request_secs))
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .build()
        .map_err(|e| LlmError::HttpClientBuild(e.to_string()))
}

/// Configured from environment variables by [`LlmClient::from_env`].
pub struct LlmClient {
    inner: gemini::GeminiClient,
    model: String,
}

impl LlmClient {
    /// Build an LLM client from environment variables (see [`LlmConfig::from_env`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the HTTP client fails.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_config(LlmConfig::from_env()?)
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        let inner = gemini::GeminiClient::new(config.api_key, config.base_url, config.timeouts)?;
        Ok(Self { inner, model: config.model })
    }
}

#[async_trait::async_trait]
impl LlmChat for LlmClient {
    async fn chat(&self, max_tokens: u32, system: &str, messages: &[Message]) -> Result<ChatResponse, LlmError> {
        self.inner.chat(&self.model, max_tokens, system, messages).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}
