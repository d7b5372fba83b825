//! Launch announcements on social channels

use async_trait::async_trait;
use futures::future::join_all;
use kit::FrameworkError;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ensure_success;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub text: String,
    pub url: String,
}

#[async_trait]
pub trait SocialPoster: Send + Sync {
    async fn post(&self, post: &SocialPost) -> Result<(), FrameworkError>;
}

/// Posts to every configured webhook (Slack, Discord, a Zapier relay, ...)
pub struct WebhookSocialPoster {
    http: reqwest::Client,
    webhooks: Vec<String>,
}

impl WebhookSocialPoster {
    pub fn new(http: reqwest::Client, webhooks: Vec<String>) -> Self {
        Self { http, webhooks }
    }
}

#[async_trait]
impl SocialPoster for WebhookSocialPoster {
    async fn post(&self, post: &SocialPost) -> Result<(), FrameworkError> {
        if self.webhooks.is_empty() {
            tracing::debug!(url = %post.url, "no social channels configured");
            return Ok(());
        }

        let body = json!({ "text": post.text, "content": post.text, "url": post.url });
        let sends = self.webhooks.iter().map(|webhook| {
            let request = self.http.post(webhook).json(&body);
            async move {
                let response = request.send().await?;
                ensure_success("social", response).await.map(|_| ())
            }
        });

        let failures: Vec<String> = join_all(sends)
            .await
            .into_iter()
            .filter_map(|result| result.err().map(|e| e.to_string()))
            .collect();

        if failures.is_empty() {
            tracing::info!(url = %post.url, channels = self.webhooks.len(), "social post sent");
            Ok(())
        } else {
            Err(FrameworkError::upstream("social", failures.join("; ")))
        }
    }
}
