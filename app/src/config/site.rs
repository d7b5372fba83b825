use kit::{env, env_optional};

/// Public facts about the directory, used in email and social copy
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub name: String,
    pub tagline: String,
    /// Base URL without a trailing slash
    pub url: String,
    /// Admin inbox for featured listing requests
    pub email: Option<String>,
}

impl SiteConfig {
    pub fn from_env() -> Self {
        let url: String = env("SITE_URL", "http://localhost:3000".to_string());
        Self {
            name: env("SITE_NAME", "FOSS Alternative".to_string()),
            tagline: env(
                "SITE_TAGLINE",
                "Free & Open Source Alternatives of Popular Software".to_string(),
            ),
            url: url.trim_end_matches('/').to_string(),
            email: env_optional("SITE_EMAIL"),
        }
    }

    /// Public page of a tool
    pub fn tool_url(&self, slug: &str) -> String {
        format!("{}/{}", self.url, slug)
    }
}
