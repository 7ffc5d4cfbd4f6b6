//! The upstream store a worker reads through to on a cache miss.

use async_trait::async_trait;
use redis::AsyncCommands;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream connection failed: {0}")]
    Connect(#[from] redis::RedisError),
}

/// Abstracts the Redis-compatible upstream so workers can be tested against
/// a mock instead of a live server. `automock` is applied outer to
/// `async_trait`, the order `mockall` requires to generate an async-aware
/// `MockUpstreamClient`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpstreamClient: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, UpstreamError>;
}

/// The production client: a connection-managed Redis handle that
/// transparently reconnects on a dropped connection.
#[derive(Clone)]
pub struct RedisUpstreamClient {
    conn: redis::aio::ConnectionManager,
}

impl RedisUpstreamClient {
    pub async fn connect(addr: &str) -> Result<Self, UpstreamError> {
        let client = redis::Client::open(format!("redis://{addr}"))?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    /// Verifies the upstream is reachable before the worker pool starts
    /// accepting jobs it has no hope of completing.
    pub async fn ping(addr: &str) -> Result<(), UpstreamError> {
        let client = redis::Client::open(format!("redis://{addr}"))?;
        let mut conn = client.get_connection_manager().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl UpstreamClient for RedisUpstreamClient {
    async fn get(&self, key: &str) -> Result<Option<String>, UpstreamError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }
}

