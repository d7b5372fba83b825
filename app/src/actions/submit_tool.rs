//! Public tool submission

use kit::FrameworkError;
use serde::Deserialize;
use validator::Validate;

use crate::models::{NewTool, Tool, ToolStatus};
use crate::notifications::{templates, NotificationJob};
use crate::repositories::ToolFilter;
use crate::workflows::Deps;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitToolInput {
    #[validate(length(min = 1, max = 120, message = "The name must be between 1 and 120 characters."))]
    pub name: String,
    #[validate(url(message = "The website url must be a valid URL."))]
    pub website_url: String,
    #[validate(url(message = "The repository url must be a valid URL."))]
    pub repository_url: String,
    pub submitter_name: Option<String>,
    #[validate(email(message = "The submitter email must be a valid email address."))]
    pub submitter_email: String,
}

pub struct SubmitToolAction {
    deps: Deps,
}

impl SubmitToolAction {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    /// Store the submission as a draft and thank the submitter
    ///
    /// The confirmation email is best effort: the submission stands even
    /// when it cannot be delivered.
    pub async fn execute(&self, input: SubmitToolInput) -> Result<Tool, FrameworkError> {
        input.validate()?;

        let tool = self
            .deps
            .tools
            .create(&NewTool {
                name: input.name,
                website_url: input.website_url,
                repository_url: input.repository_url,
                submitter_name: input.submitter_name,
                submitter_email: Some(input.submitter_email.clone()),
                ..Default::default()
            })
            .await?;

        let queue = ToolFilter {
            statuses: vec![ToolStatus::Scheduled],
            published_before: None,
        };
        let queue_length = self.deps.tools.find_many(&queue).await?.len();

        let message = templates::submission_received(
            &tool,
            &self.deps.site,
            &input.submitter_email,
            queue_length,
        );
        self.deps
            .notifier
            .dispatch(vec![NotificationJob::Email(message)])
            .await;

        tracing::info!(slug = %tool.slug, queue_length, "tool submitted");
        Ok(tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn input(name: &str, email: &str) -> SubmitToolInput {
        SubmitToolInput {
            name: name.to_string(),
            website_url: "https://foo.test".to_string(),
            repository_url: "https://github.com/foo/foo".to_string(),
            submitter_name: Some("Ada".to_string()),
            submitter_email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_submission_creates_draft_and_emails() {
        let harness = testing::deps();
        let action = SubmitToolAction::new(harness.build());

        let tool = action.execute(input("Foo Bar", "a@b.com")).await.unwrap();

        assert_eq!(tool.slug, "foo-bar");
        assert_eq!(tool.status, ToolStatus::Draft);
        assert_eq!(harness.mailer.recipients(), vec!["a@b.com".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_submission_is_rejected() {
        let harness = testing::deps();
        let action = SubmitToolAction::new(harness.build());

        let err = action.execute(input("Foo", "not-an-email")).await.unwrap_err();

        assert_eq!(err.status_code(), 422);
        assert!(harness.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_email_failure_keeps_submission() {
        let harness = testing::deps();
        harness.mailer.fail_for("a@b.com");
        let action = SubmitToolAction::new(harness.build());

        let tool = action.execute(input("Foo", "a@b.com")).await.unwrap();

        assert_eq!(tool.slug, "foo");
        assert_eq!(harness.mailer.attempts(), 1);
    }
}
