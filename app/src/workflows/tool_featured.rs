//! Ask the site admin to review a featured listing

use async_trait::async_trait;
use kit::{FrameworkError, RetryPolicy, Workflow, WorkflowContext};
use serde_json::{json, Value};

use crate::models::Tool;
use crate::notifications::{templates, NotificationJob};
use crate::workflows::{slug_input, Deps};

pub struct ToolFeatured {
    deps: Deps,
}

impl ToolFeatured {
    pub const NAME: &'static str = "tool.featured";

    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    pub fn policy() -> RetryPolicy {
        RetryPolicy::attempts(3)
    }
}

#[async_trait]
impl Workflow for ToolFeatured {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn retry_policy(&self) -> RetryPolicy {
        Self::policy()
    }

    async fn run(&self, ctx: &WorkflowContext, input: Value) -> Result<Value, FrameworkError> {
        let slug = slug_input(input)?;
        let deps = &self.deps;

        let tool: Tool = ctx
            .run_step("fetch-tool", || deps.tools.find_by_slug_or_fail(&slug))
            .await?;

        ctx.run_step("send-featured-emails", || async {
            let to = deps
                .site
                .email
                .as_deref()
                .ok_or_else(|| FrameworkError::not_configured("site email"))?;
            let message = templates::featured_request(&tool, &deps.site, to);
            deps.notifier.send(&NotificationJob::Email(message)).await
        })
        .await?;

        Ok(json!({ "slug": tool.slug }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolStatus;
    use crate::testing;
    use kit::Engine;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_admin_is_notified() {
        let harness = testing::deps();
        harness.seed_tool("foo", None, ToolStatus::Published, Some(chrono::Utc::now())).await;
        let engine = Engine::new(Arc::new(crate::workflows::registry(&harness.build())));

        let report = engine
            .run_inline(ToolFeatured::NAME, json!({ "slug": "foo" }))
            .await
            .unwrap();

        assert!(report.succeeded());
        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "admin@openalternative.test");
        assert_eq!(sent[0].subject, "New Featured Listing Request");
    }

    #[tokio::test]
    async fn test_missing_admin_email_fails_without_retry() {
        let harness = testing::deps().with_site(crate::config::SiteConfig {
            email: None,
            ..testing::site()
        });
        harness.seed_tool("foo", None, ToolStatus::Published, Some(chrono::Utc::now())).await;
        let engine = Engine::new(Arc::new(crate::workflows::registry(&harness.build())));

        let report = engine
            .run_inline(ToolFeatured::NAME, json!({ "slug": "foo" }))
            .await
            .unwrap();

        assert!(!report.succeeded());
        assert_eq!(report.attempts, 1);
    }
}
