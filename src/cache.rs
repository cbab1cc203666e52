use anyhow::Context;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};

/// Lookaside key-value cache. Never the source of truth: callers treat every
/// error as a miss and fall back to the store.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn invalidate(&self, key: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

/// Opens the shared Redis connection used by the cache and the rate limiter.
pub async fn connect_redis(url: &str) -> anyhow::Result<ConnectionManager> {
    let client = redis::Client::open(url).context("parse redis url")?;
    ConnectionManager::new(client)
        .await
        .context("connect to redis")
}

impl RedisCache {
    pub fn new(conn: ConnectionManager, ttl_seconds: u64) -> Self {
        Self { conn, ttl_seconds }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.context("redis GET")?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, self.ttl_seconds)
            .await
            .context("redis SET")?;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.context("redis DEL")?;
        Ok(())
    }
}

/// Used when no cache is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait]
impl Cache for NoCache {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
    async fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
        Ok(())
    }
    async fn invalidate(&self, _key: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
