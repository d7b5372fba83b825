//! Favicon and screenshot capture, stored in object storage

use async_trait::async_trait;
use kit::FrameworkError;
use serde_json::json;

use super::ensure_success;

const FAVICON_SERVICE_URL: &str = "https://www.google.com/s2/favicons";

/// Storage key of a tool asset, e.g. `tools/supabase/favicon.png`
pub fn asset_key(slug: &str, asset: &str) -> String {
    format!("tools/{}/{}.png", slug, asset)
}

/// Captures an image of a website and returns its public URL
///
/// Uploading to an existing key replaces the object, so re-running a
/// capture is safe.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload_favicon(&self, website_url: &str, key: &str) -> Result<String, FrameworkError>;

    async fn upload_screenshot(&self, website_url: &str, key: &str)
        -> Result<String, FrameworkError>;
}

pub struct HttpMediaUploader {
    http: reqwest::Client,
    browserless_url: Option<String>,
    browserless_token: Option<String>,
    storage_url: Option<String>,
    storage_token: Option<String>,
    public_url: Option<String>,
    favicon_service_url: String,
}

impl HttpMediaUploader {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            browserless_url: None,
            browserless_token: None,
            storage_url: None,
            storage_token: None,
            public_url: None,
            favicon_service_url: FAVICON_SERVICE_URL.to_string(),
        }
    }

    pub fn browserless(mut self, url: Option<String>, token: Option<String>) -> Self {
        self.browserless_url = url.map(|u| u.trim_end_matches('/').to_string());
        self.browserless_token = token;
        self
    }

    pub fn storage(
        mut self,
        url: Option<String>,
        token: Option<String>,
        public_url: Option<String>,
    ) -> Self {
        self.storage_url = url.map(|u| u.trim_end_matches('/').to_string());
        self.storage_token = token;
        self.public_url = public_url.map(|u| u.trim_end_matches('/').to_string());
        self
    }

    async fn store(&self, key: &str, image: Vec<u8>) -> Result<String, FrameworkError> {
        let storage_url = self
            .storage_url
            .as_deref()
            .ok_or_else(|| FrameworkError::not_configured("storage"))?;

        let mut request = self
            .http
            .put(format!("{}/{}", storage_url, key))
            .header("Content-Type", "image/png")
            .header("Cache-Control", "public, max-age=604800")
            .body(image);
        if let Some(token) = &self.storage_token {
            request = request.bearer_auth(token);
        }
        ensure_success("storage", request.send().await?).await?;

        let public_url = self.public_url.as_deref().unwrap_or(storage_url);
        Ok(format!("{}/{}", public_url, key))
    }
}

#[async_trait]
impl MediaUploader for HttpMediaUploader {
    async fn upload_favicon(&self, website_url: &str, key: &str) -> Result<String, FrameworkError> {
        let response = self
            .http
            .get(&self.favicon_service_url)
            .query(&[("sz", "128"), ("domain_url", website_url)])
            .send()
            .await?;
        let image = ensure_success("favicon", response).await?.bytes().await?;

        self.store(key, image.to_vec()).await
    }

    async fn upload_screenshot(
        &self,
        website_url: &str,
        key: &str,
    ) -> Result<String, FrameworkError> {
        let base_url = self
            .browserless_url
            .as_deref()
            .ok_or_else(|| FrameworkError::not_configured("browserless"))?;

        let mut endpoint = format!("{}/screenshot", base_url);
        if let Some(token) = &self.browserless_token {
            endpoint.push_str(&format!("?token={}", token));
        }

        let body = json!({
            "url": website_url,
            "options": { "type": "png" },
            "viewport": { "width": 1280, "height": 720 },
            "gotoOptions": { "waitUntil": "networkidle2", "timeout": 20_000 },
        });

        let response = self.http.post(&endpoint).json(&body).send().await?;
        let image = ensure_success("browserless", response).await?.bytes().await?;
        tracing::debug!(website_url, bytes = image.len(), "screenshot captured");

        self.store(key, image.to_vec()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_key() {
        assert_eq!(asset_key("supabase", "favicon"), "tools/supabase/favicon.png");
        assert_eq!(asset_key("supabase", "screenshot"), "tools/supabase/screenshot.png");
    }

    #[tokio::test]
    async fn test_unconfigured_services_fail_fatally() {
        let uploader = HttpMediaUploader::new(reqwest::Client::new());

        let err = uploader
            .upload_screenshot("https://supabase.com", "tools/supabase/screenshot.png")
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("browserless"));
    }
}
