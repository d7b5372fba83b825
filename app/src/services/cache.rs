//! Cache invalidation signal for the web front end

use async_trait::async_trait;
use kit::FrameworkError;
use redis::AsyncCommands;
use serde_json::json;

/// Cache tags understood by the front end
pub mod tags {
    /// Every tool listing
    pub const TOOLS: &str = "tools";
    /// The upcoming publication schedule
    pub const SCHEDULE: &str = "schedule";

    /// A single tool page
    pub fn tool(slug: &str) -> String {
        format!("tool-{}", slug)
    }
}

#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, tags: &[String]) -> Result<(), FrameworkError>;
}

/// Publishes `{"tags": [...]}` on a Redis channel
pub struct RedisCacheInvalidator {
    conn: redis::aio::ConnectionManager,
    channel: String,
}

impl RedisCacheInvalidator {
    pub const DEFAULT_CHANNEL: &'static str = "cache:invalidate";

    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self {
            conn,
            channel: Self::DEFAULT_CHANNEL.to_string(),
        }
    }
}

#[async_trait]
impl CacheInvalidator for RedisCacheInvalidator {
    async fn invalidate(&self, tags: &[String]) -> Result<(), FrameworkError> {
        let mut conn = self.conn.clone();
        let message = json!({ "tags": tags }).to_string();
        let receivers: i64 = conn.publish(&self.channel, message).await?;
        tracing::info!(?tags, receivers, "cache invalidated");
        Ok(())
    }
}

/// Used when Redis is not configured; only records the intent
pub struct LogCacheInvalidator;

#[async_trait]
impl CacheInvalidator for LogCacheInvalidator {
    async fn invalidate(&self, tags: &[String]) -> Result<(), FrameworkError> {
        tracing::info!(?tags, "cache invalidation (no subscriber configured)");
        Ok(())
    }
}
