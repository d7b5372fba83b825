//! External collaborators of the pipeline
//!
//! Every collaborator sits behind a trait so workflows can be exercised with
//! the in-memory fakes from [`crate::testing`]. The HTTP implementations
//! share one `reqwest::Client` built at startup.

pub mod cache;
pub mod content;
pub mod github;
pub mod mailer;
pub mod media;
pub mod social;
pub mod stack;

pub use cache::{tags, CacheInvalidator, LogCacheInvalidator, RedisCacheInvalidator};
pub use content::{AnthropicContentGenerator, ContentGenerator, GeneratedContent};
pub use github::{GithubClient, RepositoryData, RepositoryFetcher};
pub use mailer::{EmailMessage, HttpMailer, LogMailer, Mailer};
pub use media::{asset_key, HttpMediaUploader, MediaUploader};
pub use social::{SocialPost, SocialPoster, WebhookSocialPoster};
pub use stack::{
    AnalysisCache, CachedStackAnalyzer, HttpStackAnalyzer, RedisAnalysisCache, StackAnalyzer,
};

use kit::FrameworkError;
use std::time::Duration;

const USER_AGENT: &str = concat!("openalternative-workflows/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for every outbound call
pub fn http_client() -> Result<reqwest::Client, FrameworkError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FrameworkError::internal(format!("failed to build HTTP client: {}", e)))
}

/// Map a non-2xx response to a classified error
///
/// Timeouts, rate limits and server errors may pass on a later attempt;
/// any other client error will not.
pub(crate) async fn ensure_success(
    service: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, FrameworkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("{} responded {}: {}", service, status, truncate(&body, 300));
    if status.as_u16() == 408 || status.as_u16() == 429 || status.is_server_error() {
        Err(FrameworkError::upstream(service, message))
    } else {
        Err(FrameworkError::non_retriable(message))
    }
}

fn truncate(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
