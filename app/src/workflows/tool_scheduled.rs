//! Onboarding: enrich a freshly scheduled tool and tell its submitter

use async_trait::async_trait;
use kit::{FrameworkError, RetryPolicy, Workflow, WorkflowContext};
use serde_json::{json, Value};

use crate::enrichment;
use crate::models::Tool;
use crate::notifications::{templates, NotificationJob};
use crate::services::tags;
use crate::workflows::{slug_input, Deps};

pub struct ToolScheduled {
    deps: Deps,
}

impl ToolScheduled {
    pub const NAME: &'static str = "tool.scheduled";

    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    pub fn policy() -> RetryPolicy {
        RetryPolicy::attempts(2)
    }

    /// Mail the submitter, unless the tool disappeared in the meantime
    async fn notify_submitter(&self, slug: &str, to: &str) -> Result<bool, FrameworkError> {
        let Some(tool) = self.deps.tools.find_by_slug(slug).await? else {
            tracing::info!(slug, "tool deleted during onboarding, skipping email");
            return Ok(false);
        };

        let message = templates::tool_scheduled(&tool, &self.deps.site, to);
        self.deps.notifier.send(&NotificationJob::Email(message)).await?;
        Ok(true)
    }
}

#[async_trait]
impl Workflow for ToolScheduled {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn retry_policy(&self) -> RetryPolicy {
        Self::policy()
    }

    fn concurrency_limit(&self) -> Option<usize> {
        Some(2)
    }

    async fn run(&self, ctx: &WorkflowContext, input: Value) -> Result<Value, FrameworkError> {
        let slug = slug_input(input)?;
        let deps = &self.deps;

        let tool: Tool = ctx
            .run_step("find-tool", || deps.tools.find_by_slug_or_fail(&slug))
            .await?;

        // Each step writes its own columns, see `enrichment`
        let report = ctx
            .group()
            .step("generate-content", || enrichment::generate_content(deps, &tool))
            .step("fetch-repository-data", || {
                enrichment::fetch_repository_data(deps, &tool)
            })
            .step("upload-favicon", || enrichment::upload_favicon(deps, &tool))
            .step("upload-screenshot", || enrichment::upload_screenshot(deps, &tool))
            .join()
            .await;

        let cache_tags = [tags::SCHEDULE.to_string(), tags::tool(&tool.slug)];
        let revalidate = report.covering_step("revalidate-cache");
        let revalidated = ctx
            .run_step(&revalidate, || deps.cache.invalidate(&cache_tags))
            .await;
        if let Err(err) = revalidated {
            ctx.catch("revalidate-cache", err);
        }

        let mut emailed = false;
        if let Some(to) = tool.submitter_email.as_deref() {
            match ctx
                .run_step("send-email", || self.notify_submitter(&tool.slug, to))
                .await
            {
                Ok(sent) => emailed = sent,
                Err(err) => ctx.catch("send-email", err),
            }
        }

        Ok(json!({
            "slug": tool.slug,
            "enriched": report.succeeded.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            "failed": report.failed.iter().map(|f| &f.label).collect::<Vec<_>>(),
            "emailed": emailed,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolStatus;
    use crate::repositories::ToolStore;
    use crate::testing;
    use chrono::Utc;
    use kit::Engine;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn engine(deps: &Deps) -> Engine {
        Engine::new(Arc::new(crate::workflows::registry(deps)))
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_without_side_effects() {
        let harness = testing::deps();
        let deps = harness.build();

        let report = engine(&deps)
            .run_inline(ToolScheduled::NAME, json!({ "slug": "missing" }))
            .await
            .unwrap();

        assert!(!report.succeeded());
        assert_eq!(report.attempts, 1);
        assert!(harness.cache.invalidations().is_empty());
        assert_eq!(harness.content.calls(), 0);
    }

    #[tokio::test]
    async fn test_onboarding_enriches_and_emails() {
        let harness = testing::deps();
        let tool = harness
            .seed_tool("foo", Some("a@b.com"), ToolStatus::Scheduled, Some(Utc::now()))
            .await;
        let deps = harness.build();

        let report = engine(&deps)
            .run_inline(ToolScheduled::NAME, json!({ "slug": "foo" }))
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.output.as_ref().unwrap()["emailed"], json!(true));

        let stored = harness.store.find_or_fail(tool.id).await.unwrap();
        assert!(stored.tagline.is_some());
        assert!(stored.favicon_url.is_some());
        assert!(stored.screenshot_url.is_some());
        assert_eq!(stored.stars, Some(1000));

        assert_eq!(
            harness.cache.invalidations(),
            vec![vec!["schedule".to_string(), "tool-foo".to_string()]]
        );
        assert_eq!(harness.mailer.recipients(), vec!["a@b.com".to_string()]);
    }

    #[tokio::test]
    async fn test_email_skipped_when_tool_deleted() {
        let harness = testing::deps();
        let tool = harness
            .seed_tool("gone", Some("a@b.com"), ToolStatus::Scheduled, Some(Utc::now()))
            .await;
        let workflow = ToolScheduled::new(harness.build());

        harness.store.delete_many(&[tool.id]).await.unwrap();
        let sent = workflow.notify_submitter("gone", "a@b.com").await.unwrap();

        assert!(!sent);
        assert_eq!(harness.mailer.recipients(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_email_failure_is_caught() {
        let harness = testing::deps();
        harness.mailer.fail_for("a@b.com");
        harness
            .seed_tool("foo", Some("a@b.com"), ToolStatus::Scheduled, Some(Utc::now()))
            .await;
        let deps = harness.build();

        let report = engine(&deps)
            .run_inline(ToolScheduled::NAME, json!({ "slug": "foo" }))
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.attempts, 2);
        assert_eq!(report.caught.len(), 1);
        assert_eq!(report.caught[0].label, "send-email");
        // enrichment steps replayed from the memo on the second attempt
        assert_eq!(harness.content.calls(), 1);
    }
}
