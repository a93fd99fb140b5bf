//! Process configuration read from environment variables.
//!
//! `main` loads `.env` (if present) before calling [`AppConfig::from_env`],
//! so every knob can come from either the shell or the dotenv file.

use std::time::Duration;

use crate::services::session::MAX_SESSION_TTL;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Parse an env var, falling back to `default` when unset or malformed.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Parse a boolean env var. Unknown spellings read as unset.
pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub session_ttl: Duration,
    pub cookie_secure: bool,
}

impl AppConfig {
    /// Build from `PORT`, `SESSION_TTL_SECS` and `COOKIE_SECURE`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            session_ttl: Duration::from_secs(env_parse("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS))
                .min(MAX_SESSION_TTL),
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(false),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            cookie_secure: false,
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
