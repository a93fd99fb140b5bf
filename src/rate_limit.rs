//! In-memory rate limiting for generation requests.
//!
//! DESIGN
//! ======
//! Sliding-window counters keyed by user id. Three limits are enforced before
//! every upstream LLM call:
//! - Per-user: 10 generation requests/min
//! - Global: 20 LLM API calls/min
//! - Token budget: 50k tokens/user/hour, settled from reported usage
//!
//! A request that passes the window checks is recorded immediately; token usage
//! is only known after the upstream call and is recorded separately.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::env_parse;

const DEFAULT_PER_USER_LIMIT: usize = 10;
const DEFAULT_PER_USER_WINDOW_SECS: u64 = 60;

const DEFAULT_GLOBAL_LIMIT: usize = 20;
const DEFAULT_GLOBAL_WINDOW_SECS: u64 = 60;

const DEFAULT_TOKEN_BUDGET: u64 = 50_000;
const DEFAULT_TOKEN_WINDOW_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_user_limit: usize,
    pub per_user_window: Duration,
    pub global_limit: usize,
    pub global_window: Duration,
    pub token_budget: u64,
    pub token_window: Duration,
}

impl RateLimitConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            per_user_limit: env_parse("RATE_LIMIT_PER_CLIENT", DEFAULT_PER_USER_LIMIT),
            per_user_window: Duration::from_secs(env_parse(
                "RATE_LIMIT_PER_CLIENT_WINDOW_SECS",
                DEFAULT_PER_USER_WINDOW_SECS,
            )),
            global_limit: env_parse("RATE_LIMIT_GLOBAL", DEFAULT_GLOBAL_LIMIT),
            global_window: Duration::from_secs(env_parse("RATE_LIMIT_GLOBAL_WINDOW_SECS", DEFAULT_GLOBAL_WINDOW_SECS)),
            token_budget: env_parse("RATE_LIMIT_TOKEN_BUDGET", DEFAULT_TOKEN_BUDGET),
            token_window: Duration::from_secs(env_parse("RATE_LIMIT_TOKEN_WINDOW_SECS", DEFAULT_TOKEN_WINDOW_SECS)),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_user_limit: DEFAULT_PER_USER_LIMIT,
            per_user_window: Duration::from_secs(DEFAULT_PER_USER_WINDOW_SECS),
            global_limit: DEFAULT_GLOBAL_LIMIT,
            global_window: Duration::from_secs(DEFAULT_GLOBAL_WINDOW_SECS),
            token_budget: DEFAULT_TOKEN_BUDGET,
            token_window: Duration::from_secs(DEFAULT_TOKEN_WINDOW_SECS),
        }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum RateLimitError {
    #[error("per-user rate limit exceeded (max {limit} requests/{window_secs}s)")]
    PerUserExceeded { limit: usize, window_secs: u64 },
    #[error("global rate limit exceeded (max {limit} requests/{window_secs}s)")]
    GlobalExceeded { limit: usize, window_secs: u64 },
    #[error("token budget exceeded (max {budget} tokens/{window_secs}s)")]
    TokenBudgetExceeded { budget: u64, window_secs: u64 },
}

impl crate::error::ErrorCode for RateLimitError {
    fn error_code(&self) -> &'static str {
        "E_RATE_LIMITED"
    }

    fn retryable(&self) -> bool {
        true
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<Windows>>,
    config: RateLimitConfig,
}

#[derive(Default)]
struct Windows {
    user_requests: HashMap<String, VecDeque<Instant>>,
    global_requests: VecDeque<Instant>,
    /// Per-user token usage: (timestamp, tokens).
    user_tokens: HashMap<String, VecDeque<(Instant, u64)>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { inner: Arc::new(Mutex::new(Windows::default())), config }
    }

    fn lock(&self) -> MutexGuard<'_, Windows> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Check request windows and token budget, then record the request.
    ///
    /// # Errors
    ///
    /// Returns the first limit that would be exceeded; nothing is recorded then.
    pub fn check_and_record(&self, user_id: &str) -> Result<(), RateLimitError> {
        self.check_and_record_at(user_id, Instant::now())
    }

    fn check_and_record_at(&self, user_id: &str, now: Instant) -> Result<(), RateLimitError> {
        let cfg = self.config;
        let mut guard = self.lock();
        let windows = &mut *guard;

        if let Some(tokens) = windows.user_tokens.get_mut(user_id) {
            prune(tokens, now, cfg.token_window, |(at, _)| *at);
            let used: u64 = tokens.iter().map(|(_, t)| t).sum();
            if used >= cfg.token_budget {
                return Err(RateLimitError::TokenBudgetExceeded {
                    budget: cfg.token_budget,
                    window_secs: cfg.token_window.as_secs(),
                });
            }
        }

        prune(&mut windows.global_requests, now, cfg.global_window, |at| *at);
        if windows.global_requests.len() >= cfg.global_limit {
            return Err(RateLimitError::GlobalExceeded {
                limit: cfg.global_limit,
                window_secs: cfg.global_window.as_secs(),
            });
        }

        let requests = windows.user_requests.entry(user_id.to_owned()).or_default();
        prune(requests, now, cfg.per_user_window, |at| *at);
        if requests.len() >= cfg.per_user_limit {
            return Err(RateLimitError::PerUserExceeded {
                limit: cfg.per_user_limit,
                window_secs: cfg.per_user_window.as_secs(),
            });
        }

        requests.push_back(now);
        windows.global_requests.push_back(now);
        Ok(())
    }

    /// Record token usage reported by the provider after a call.
    pub fn record_tokens(&self, user_id: &str, tokens: u64) {
        self.record_tokens_at(user_id, tokens, Instant::now());
    }

    fn record_tokens_at(&self, user_id: &str, tokens: u64, now: Instant) {
        if tokens == 0 {
            return;
        }
        let window = self.config.token_window;
        let mut windows = self.lock();
        let usage = windows.user_tokens.entry(user_id.to_owned()).or_default();
        prune(usage, now, window, |(at, _)| *at);
        usage.push_back((now, tokens));
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune<T>(deque: &mut VecDeque<T>, now: Instant, window: Duration, at: impl Fn(&T) -> Instant) {
    while let Some(front) = deque.front() {
        if now.duration_since(at(front)) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
