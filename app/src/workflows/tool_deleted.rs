//! Clean up after a deleted tool

use async_trait::async_trait;
use kit::{FrameworkError, RetryPolicy, Workflow, WorkflowContext};
use serde_json::{json, Value};

use crate::services::tags;
use crate::workflows::{slug_input, Deps, ToolScheduled};

pub struct ToolDeleted {
    deps: Deps,
}

impl ToolDeleted {
    pub const NAME: &'static str = "tool.deleted";

    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    pub fn policy() -> RetryPolicy {
        RetryPolicy::attempts(3)
    }
}

#[async_trait]
impl Workflow for ToolDeleted {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn retry_policy(&self) -> RetryPolicy {
        Self::policy()
    }

    async fn run(&self, ctx: &WorkflowContext, input: Value) -> Result<Value, FrameworkError> {
        let slug = slug_input(input)?;
        let deps = &self.deps;

        // An onboarding still running will find the record gone and skip its email
        let cancelled: u64 = ctx
            .run_step("cancel-onboarding", || {
                deps.events.cancel_pending(ToolScheduled::NAME, &slug)
            })
            .await?;

        let cache_tags = [tags::TOOLS.to_string(), tags::tool(&slug)];
        ctx.run_step("revalidate-cache", || deps.cache.invalidate(&cache_tags))
            .await?;

        Ok(json!({ "slug": slug, "cancelled": cancelled }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use kit::Engine;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cancels_onboarding_and_invalidates() {
        let harness = testing::deps();
        let engine = Engine::new(Arc::new(crate::workflows::registry(&harness.build())));

        let report = engine
            .run_inline(ToolDeleted::NAME, json!({ "slug": "foo" }))
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(
            harness.events.cancellations(),
            vec![("tool.scheduled".to_string(), "foo".to_string())]
        );
        assert_eq!(
            harness.cache.invalidations(),
            vec![vec!["tools".to_string(), "tool-foo".to_string()]]
        );
    }
}
