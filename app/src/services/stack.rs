//! Technology stack analysis with a long-lived cache

use async_trait::async_trait;
use kit::FrameworkError;
use redis::AsyncCommands;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::ensure_success;

/// Tech stacks rarely change, so analyses are kept for 30 days
pub const ANALYSIS_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);

#[async_trait]
pub trait StackAnalyzer: Send + Sync {
    /// Technology identifiers (stack slugs) used by the repository
    async fn analyze(&self, repository_url: &str) -> Result<Vec<String>, FrameworkError>;
}

#[async_trait]
pub trait AnalysisCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<String>>, FrameworkError>;

    async fn set(&self, key: &str, stack: &[String], ttl: Duration) -> Result<(), FrameworkError>;
}

/// Live analysis through the analyzer service's `POST /analyze`
pub struct HttpStackAnalyzer {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl HttpStackAnalyzer {
    pub fn new(http: reqwest::Client, base_url: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }
}

#[async_trait]
impl StackAnalyzer for HttpStackAnalyzer {
    async fn analyze(&self, repository_url: &str) -> Result<Vec<String>, FrameworkError> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| FrameworkError::not_configured("stack-analyzer"))?;

        let response = self
            .http
            .post(format!("{}/analyze", base_url))
            .json(&json!({ "repository": repository_url }))
            .send()
            .await?;

        Ok(ensure_success("stack-analyzer", response).await?.json().await?)
    }
}

/// Serves analyses from cache, falling back to a live call on a miss
///
/// Cache failures are logged and treated as misses.
pub struct CachedStackAnalyzer {
    inner: Arc<dyn StackAnalyzer>,
    cache: Arc<dyn AnalysisCache>,
}

impl CachedStackAnalyzer {
    pub fn new(inner: Arc<dyn StackAnalyzer>, cache: Arc<dyn AnalysisCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache_key(repository_url: &str) -> String {
        format!("analysis:{}", repository_url)
    }
}

#[async_trait]
impl StackAnalyzer for CachedStackAnalyzer {
    async fn analyze(&self, repository_url: &str) -> Result<Vec<String>, FrameworkError> {
        let key = Self::cache_key(repository_url);

        match self.cache.get(&key).await {
            Ok(Some(stack)) => {
                tracing::debug!(repository_url, "stack analysis served from cache");
                return Ok(stack);
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(repository_url, error = %err, "analysis cache read failed"),
        }

        let stack = self.inner.analyze(repository_url).await?;

        if let Err(err) = self.cache.set(&key, &stack, ANALYSIS_TTL).await {
            tracing::warn!(repository_url, error = %err, "analysis cache write failed");
        }
        Ok(stack)
    }
}

pub struct RedisAnalysisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisAnalysisCache {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl AnalysisCache for RedisAnalysisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<String>>, FrameworkError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, stack: &[String], ttl: Duration) -> Result<(), FrameworkError> {
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(stack)?;
        conn.set_ex::<_, _, ()>(key, raw, ttl.as_secs()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeStackAnalyzer, MemoryAnalysisCache};

    #[tokio::test]
    async fn test_cache_hit_skips_live_analysis() {
        let live = Arc::new(FakeStackAnalyzer::new(&["react", "postgresql"]));
        let cache = Arc::new(MemoryAnalysisCache::new());
        let analyzer = CachedStackAnalyzer::new(live.clone(), cache.clone());

        let first = analyzer.analyze("https://github.com/foo/foo").await.unwrap();
        let second = analyzer.analyze("https://github.com/foo/foo").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(live.calls(), 1);
        assert_eq!(
            cache.ttl("analysis:https://github.com/foo/foo"),
            Some(ANALYSIS_TTL)
        );
    }

    #[tokio::test]
    async fn test_cache_failure_fails_open() {
        let live = Arc::new(FakeStackAnalyzer::new(&["rust"]));
        let cache = Arc::new(MemoryAnalysisCache::new());
        cache.set_broken(true);
        let analyzer = CachedStackAnalyzer::new(live.clone(), cache);

        let stack = analyzer.analyze("https://github.com/foo/foo").await.unwrap();

        assert_eq!(stack, vec!["rust".to_string()]);
        assert_eq!(live.calls(), 1);
    }
}
