//! Session tokens.
//!
//! ARCHITECTURE
//! ============
//! A login mints a random 32-byte token that is handed to the client (cookie
//! and JSON body). The store only keeps the SHA-256 of the token, so a dump of
//! the map cannot be replayed. Sessions carry the user snapshot taken at login
//! and expire after the configured TTL; expired entries are purged on lookup.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::directory::{PublicUser, Role};

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

fn hash_token(token: &str) -> String {
    bytes_to_hex(&Sha256::digest(token.as_bytes()))
}

/// The signed-in user as seen by handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&PublicUser> for SessionUser {
    fn from(user: &PublicUser) -> Self {
        Self { id: user.id.clone(), name: user.name.clone(), email: user.email.clone(), role: user.role }
    }
}

/// True when a user is signed in and holds one of `allowed`.
#[must_use]
pub fn is_authorized(user: Option<&SessionUser>, allowed: &[Role]) -> bool {
    user.is_some_and(|u| allowed.contains(&u.role))
}

/// Upper bound on a session lifetime. Larger TTLs are clamped to it.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

struct Session {
    user: SessionUser,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), ttl: ttl.min(MAX_SESSION_TTL) }
    }

    /// Create a session for the given user, returning the token.
    pub async fn create(&self, user: SessionUser) -> String {
        let token = generate_token();
        let expires_at = Instant::now() + self.ttl;
        self.sessions
            .write()
            .await
            .insert(hash_token(&token), Session { user, expires_at });
        token
    }

    /// Validate a session token and return the associated user.
    pub async fn validate(&self, token: &str) -> Option<SessionUser> {
        self.validate_at(token, Instant::now()).await
    }

    async fn validate_at(&self, token: &str, now: Instant) -> Option<SessionUser> {
        if token.is_empty() {
            return None;
        }
        let key = hash_token(token);
        {
            let sessions = self.sessions.read().await;
            match sessions.get(&key) {
                None => return None,
                Some(s) if s.expires_at > now => return Some(s.user.clone()),
                Some(_) => {}
            }
        }
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| s.expires_at > now);
        None
    }

    /// Delete a session by token. Unknown tokens are ignored.
    pub async fn delete(&self, token: &str) {
        self.sessions.write().await.remove(&hash_token(token));
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
