//! Publish sweep: promote scheduled tools whose date has come

use async_trait::async_trait;
use chrono::Utc;
use kit::{FrameworkError, RetryPolicy, Workflow, WorkflowContext};
use serde_json::{json, Value};

use crate::models::{Tool, ToolPatch, ToolStatus};
use crate::notifications::{templates, NotificationJob};
use crate::repositories::ToolFilter;
use crate::services::tags;
use crate::workflows::Deps;

pub struct PublishTools {
    deps: Deps,
}

impl PublishTools {
    pub const NAME: &'static str = "publish-tools";

    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    pub fn policy() -> RetryPolicy {
        RetryPolicy::attempts(3)
    }

    /// Publish one tool; its steps are named after the slug so tools never
    /// share a memo entry
    async fn publish(&self, ctx: &WorkflowContext, tool: &Tool) -> Result<(), FrameworkError> {
        let deps = &self.deps;
        let slug = &tool.slug;

        let patch = ToolPatch::status(ToolStatus::Published);
        let published: Tool = ctx
            .run_step(&format!("update-tool-status-{}", slug), || {
                deps.tools.update(tool.id, &patch)
            })
            .await?;

        let cache_tags = [tags::tool(slug), tags::TOOLS.to_string(), tags::SCHEDULE.to_string()];
        ctx.run_step(&format!("revalidate-cache-{}", slug), || {
            deps.cache.invalidate(&cache_tags)
        })
        .await?;

        // A rejected post must never be retried, or the status update above
        // would be followed by duplicate posts
        let social_step = format!("post-on-socials-{}", slug);
        let posted = ctx
            .run_step(&social_step, || async {
                let post = templates::launch_post(&published, &deps.site);
                deps.notifier
                    .send(&NotificationJob::SocialPost(post))
                    .await
                    .map_err(|err| FrameworkError::non_retriable(err.to_string()))
            })
            .await;
        if let Err(err) = posted {
            ctx.catch(social_step, err);
        }

        if let Some(to) = published.submitter_email.as_deref() {
            ctx.run_step(&format!("send-email-{}", slug), || async {
                let message = templates::tool_published(&published, &deps.site, to);
                deps.notifier.send(&NotificationJob::Email(message)).await
            })
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl Workflow for PublishTools {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn retry_policy(&self) -> RetryPolicy {
        Self::policy()
    }

    async fn run(&self, ctx: &WorkflowContext, _input: Value) -> Result<Value, FrameworkError> {
        let tools: Vec<Tool> = ctx
            .run_step("fetch-tools", || async {
                let due = ToolFilter::due_for_publication(Utc::now());
                self.deps.tools.find_many(&due).await
            })
            .await?;

        tracing::info!(count = tools.len(), "publishing due tools");

        let mut published = Vec::new();
        for tool in &tools {
            match self.publish(ctx, tool).await {
                Ok(()) => published.push(tool.slug.clone()),
                Err(err) => ctx.catch(format!("publish-{}", tool.slug), err),
            }
        }

        Ok(json!({ "published": published }))
    }
}
