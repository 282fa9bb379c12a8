//! Session store: tracks the single currently-valid refresh token per user.
//!
//! Every successful login overwrites the stored value, which is what enforces
//! the one-valid-refresh-token-per-user invariant: after logins A then B,
//! refreshing with A's token finds a mismatch and is rejected. If two logins
//! race, whichever write lands last wins and earlier tokens become invalid.
//!
//! Refresh does not rotate the stored token; it only re-mints access tokens.
//! A stolen refresh token therefore stays valid for its remaining lifetime.

use crate::error::AuthError;
use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn session_key(user_id: &str) -> String {
    format!("refresh_token:{user_id}")
}

/// Key-value store with per-key expiry, keyed by user id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `refresh_token` as the current token for `user_id`, replacing
    /// any previous value. `ttl_secs` matches the token's own expiry.
    async fn put(&self, user_id: &str, refresh_token: &str, ttl_secs: u64)
    -> Result<(), AuthError>;

    /// Fetch the current token for `user_id`, if any.
    async fn get(&self, user_id: &str) -> Result<Option<String>, AuthError>;
}

/// Redis-backed session store used in production.
#[derive(Clone)]
pub struct RedisSessionStore {
    connection: redis::aio::MultiplexedConnection,
}

impl RedisSessionStore {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        tracing::info!("Redis connection established");
        Ok(Self { connection })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(
        &self,
        user_id: &str,
        refresh_token: &str,
        ttl_secs: u64,
    ) -> Result<(), AuthError> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(session_key(user_id), refresh_token, ttl_secs)
            .await
            .map_err(|e| AuthError::Session(e.to_string()))
    }

    async fn get(&self, user_id: &str) -> Result<Option<String>, AuthError> {
        let mut conn = self.connection.clone();
        conn.get(session_key(user_id))
            .await
            .map_err(|e| AuthError::Session(e.to_string()))
    }
}

struct SessionEntry {
    token: String,
    expires_at: Instant,
}

impl SessionEntry {
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// In-memory session store with lazy expiry. Used by tests and single-node
/// deployments without Redis.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    entries: Arc<DashMap<String, SessionEntry>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(
        &self,
        user_id: &str,
        refresh_token: &str,
        ttl_secs: u64,
    ) -> Result<(), AuthError> {
        self.entries.insert(
            session_key(user_id),
            SessionEntry {
                token: refresh_token.to_string(),
                expires_at: Instant::now() + Duration::from_secs(ttl_secs),
            },
        );
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<String>, AuthError> {
        let key = session_key(user_id);
        if let Some(entry) = self.entries.get(&key) {
            if !entry.is_expired() {
                return Ok(Some(entry.token.clone()));
            }
        }
        // Drop expired entries instead of handing them out.
        self.entries.remove_if(&key, |_, entry| entry.is_expired());
        Ok(None)
    }
}
