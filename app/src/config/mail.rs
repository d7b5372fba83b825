use kit::{env, env_optional};

/// Mail configuration
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Mail driver (`api` posts to a Resend-style HTTP API, `log` only logs)
    pub driver: String,
    /// Base URL of the mail API
    pub api_url: String,
    /// Bearer token for the mail API
    pub api_key: Option<String>,
    /// Default from email address
    pub from_address: String,
    /// Default from name
    pub from_name: String,
}

impl MailConfig {
    /// Build config from environment variables
    pub fn from_env() -> Self {
        Self {
            driver: env("MAIL_DRIVER", "log".to_string()),
            api_url: env("MAIL_API_URL", "https://api.resend.com".to_string()),
            api_key: env_optional("MAIL_API_KEY"),
            from_address: env("MAIL_FROM_ADDRESS", "hello@openalternative.co".to_string()),
            from_name: env("MAIL_FROM_NAME", "FOSS Alternative".to_string()),
        }
    }

    /// `"Name <address>"` sender header
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_address)
    }
}
