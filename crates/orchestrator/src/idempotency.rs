//! Duplicate-submission detection keyed by caller-supplied tokens.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::Client;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::IdempotencyError;

/// Default lifetime of a reserved token.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const KEY_PREFIX: &str = "idempotent-key";

/// Builds the cache key for a token.
pub fn cache_key(token: &str) -> String {
    format!("{}:{}", KEY_PREFIX, token)
}

/// Trait for idempotency token reservation.
#[async_trait]
pub trait IdempotencyGuard: Send + Sync {
    /// Reserves `token` for the configured window.
    ///
    /// Returns `Ok(true)` if the token was free and is now taken, `Ok(false)`
    /// if it was already taken. A cache failure is an error, never a
    /// duplicate.
    async fn reserve(&self, token: &str) -> Result<bool, IdempotencyError>;
}

/// Redis-backed guard.
///
/// Reservation is a single `SET key exists NX EX ttl`, so two concurrent
/// submissions of the same token cannot both succeed.
#[derive(Clone)]
pub struct RedisIdempotencyGuard {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisIdempotencyGuard {
    /// Connects to Redis at `url`.
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self, IdempotencyError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        tracing::info!(url = %url, ttl_secs = ttl.as_secs(), "connected to Redis for idempotency");

        Ok(Self::new(conn, ttl))
    }

    /// Creates a guard over an existing connection.
    pub fn new(conn: ConnectionManager, ttl: Duration) -> Self {
        Self { conn, ttl }
    }
}

#[async_trait]
impl IdempotencyGuard for RedisIdempotencyGuard {
    #[tracing::instrument(skip(self))]
    async fn reserve(&self, token: &str) -> Result<bool, IdempotencyError> {
        let mut conn = self.conn.clone();

        let reply: Option<String> = redis::cmd("SET")
            .arg(cache_key(token))
            .arg("exists")
            .arg("NX")
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }
}

/// In-memory guard with per-token expiry, for tests and local runs.
#[derive(Debug, Clone)]
pub struct InMemoryIdempotencyGuard {
    reserved: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
    unavailable: Arc<AtomicBool>,
}

impl Default for InMemoryIdempotencyGuard {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl InMemoryIdempotencyGuard {
    /// Creates a guard whose reservations expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            reserved: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes subsequent reservations fail as if the cache were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the number of live reservations.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.reserved
            .lock()
            .await
            .values()
            .filter(|expires| **expires > now)
            .count()
    }

    /// Returns true if no reservation is live.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl IdempotencyGuard for InMemoryIdempotencyGuard {
    async fn reserve(&self, token: &str) -> Result<bool, IdempotencyError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IdempotencyError::Unavailable(
                "cache connection refused".to_string(),
            ));
        }

        let now = Instant::now();
        let mut reserved = self.reserved.lock().await;
        reserved.retain(|_, expires| *expires > now);

        let key = cache_key(token);
        if reserved.contains_key(&key) {
            return Ok(false);
        }
        reserved.insert(key, now + self.ttl);
        Ok(true)
    }
}
