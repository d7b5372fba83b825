use kit::{env, env_list, env_optional};

/// Credentials and endpoints of the external collaborators
///
/// Every field is optional: a missing service surfaces as a
/// `NotConfigured` error when it is first used, not at startup.
#[derive(Debug, Clone, Default)]
pub struct ServicesConfig {
    pub github_token: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
    /// Object storage endpoint that accepts `PUT {storage_url}/{key}`
    pub storage_url: Option<String>,
    pub storage_token: Option<String>,
    /// Public base URL of stored objects, defaults to `storage_url`
    pub storage_public_url: Option<String>,
    pub stack_analyzer_url: Option<String>,
    pub redis_url: Option<String>,
    pub social_webhook_urls: Vec<String>,
}

impl ServicesConfig {
    pub fn from_env() -> Self {
        Self {
            github_token: env_optional("GITHUB_TOKEN"),
            anthropic_api_key: env_optional("ANTHROPIC_API_KEY"),
            anthropic_model: env("ANTHROPIC_MODEL", "claude-3-5-haiku-latest".to_string()),
            browserless_url: env_optional("BROWSERLESS_URL"),
            browserless_token: env_optional("BROWSERLESS_TOKEN"),
            storage_url: env_optional("STORAGE_URL"),
            storage_token: env_optional("STORAGE_TOKEN"),
            storage_public_url: env_optional("STORAGE_PUBLIC_URL"),
            stack_analyzer_url: env_optional("STACK_ANALYZER_URL"),
            redis_url: env_optional("REDIS_URL"),
            social_webhook_urls: env_list("SOCIAL_WEBHOOK_URLS"),
        }
    }
}
