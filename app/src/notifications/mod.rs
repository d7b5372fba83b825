//! Notification gateway
//!
//! Emails and social posts are described as [`NotificationJob`]s and sent
//! through the [`Notifier`]. A batch dispatch never lets one failed job
//! stop its siblings.

pub mod templates;

use futures::future::join_all;
use kit::FrameworkError;
use std::sync::Arc;

use crate::services::{EmailMessage, Mailer, SocialPost, SocialPoster};

/// One outbound message, never persisted
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationJob {
    Email(EmailMessage),
    SocialPost(SocialPost),
}

impl NotificationJob {
    /// Short label for logs and reports
    pub fn label(&self) -> String {
        match self {
            Self::Email(message) => format!("email:{}", message.to),
            Self::SocialPost(post) => format!("social:{}", post.url),
        }
    }
}

/// Outcome of one job in a batch
#[derive(Debug)]
pub struct JobReport {
    pub label: String,
    pub result: Result<(), FrameworkError>,
}

impl JobReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    social: Arc<dyn SocialPoster>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, social: Arc<dyn SocialPoster>) -> Self {
        Self { mailer, social }
    }

    pub async fn send(&self, job: &NotificationJob) -> Result<(), FrameworkError> {
        match job {
            NotificationJob::Email(message) => self.mailer.send(message).await,
            NotificationJob::SocialPost(post) => self.social.post(post).await,
        }
    }

    /// Send every job concurrently and report each outcome
    pub async fn dispatch(&self, jobs: Vec<NotificationJob>) -> Vec<JobReport> {
        let sends = jobs.into_iter().map(|job| async move {
            let label = job.label();
            let result = self.send(&job).await;
            if let Err(err) = &result {
                tracing::warn!(job = %label, error = %err, "notification failed");
            }
            JobReport { label, result }
        });
        join_all(sends).await
    }
}
