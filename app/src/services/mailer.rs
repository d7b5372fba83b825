//! Transactional email

use async_trait::async_trait;
use kit::FrameworkError;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ensure_success;
use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), FrameworkError>;
}

/// Resend-style mail API: `POST {api_url}/emails`
pub struct HttpMailer {
    http: reqwest::Client,
    config: MailConfig,
}

impl HttpMailer {
    pub fn new(http: reqwest::Client, config: MailConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), FrameworkError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| FrameworkError::not_configured("mail"))?;

        let mut body = json!({
            "from": self.config.from_header(),
            "to": [message.to],
            "subject": message.subject,
            "html": message.html,
            "text": message.text,
        });
        if let Some(reply_to) = &message.reply_to {
            body["reply_to"] = json!(reply_to);
        }

        let response = self
            .http
            .post(format!("{}/emails", self.config.api_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        ensure_success("mail", response).await?;

        tracing::info!(to = %message.to, subject = %message.subject, "email sent");
        Ok(())
    }
}

/// `MAIL_DRIVER=log`: writes the message to the log instead of sending it
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), FrameworkError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.text,
            "email (log driver)"
        );
        Ok(())
    }
}
