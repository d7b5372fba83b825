//! Nightly refresh of repository statistics for every listed tool

use async_trait::async_trait;
use kit::{FrameworkError, RetryPolicy, Workflow, WorkflowContext};
use serde_json::{json, Value};

use crate::enrichment;
use crate::models::Tool;
use crate::repositories::ToolFilter;
use crate::services::tags;
use crate::workflows::Deps;

const STEP_PREFIX: &str = "fetch-repository-data-";

pub struct FetchTools {
    deps: Deps,
}

impl FetchTools {
    pub const NAME: &'static str = "fetch-tools";

    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    pub fn policy() -> RetryPolicy {
        RetryPolicy::attempts(2)
    }
}

#[async_trait]
impl Workflow for FetchTools {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn retry_policy(&self) -> RetryPolicy {
        Self::policy()
    }

    async fn run(&self, ctx: &WorkflowContext, _input: Value) -> Result<Value, FrameworkError> {
        let deps = &self.deps;

        let tools: Vec<Tool> = ctx
            .run_step("fetch-tools", || async {
                deps.tools.find_many(&ToolFilter::listed()).await
            })
            .await?;

        let mut group = ctx.group();
        for tool in &tools {
            group = group.step(format!("{}{}", STEP_PREFIX, tool.slug), move || {
                enrichment::fetch_repository_data(deps, tool)
            });
        }
        let report = group.join().await;

        let refreshed: Vec<&str> = report
            .succeeded
            .iter()
            .filter_map(|(step, _)| step.strip_prefix(STEP_PREFIX))
            .collect();

        let mut cache_tags = vec![tags::TOOLS.to_string()];
        cache_tags.extend(refreshed.iter().map(|slug| tags::tool(slug)));
        // A retry that refreshes more tools signals again
        let revalidate = report.covering_step("revalidate-cache");
        ctx.run_step(&revalidate, || deps.cache.invalidate(&cache_tags))
            .await?;

        tracing::info!(
            total = tools.len(),
            refreshed = refreshed.len(),
            failed = report.failed.len(),
            "repository data refreshed"
        );

        Ok(json!({ "refreshed": refreshed, "failed": report.failed.len() }))
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

    #[tokio::test]
    async fn test_refreshes_listed_tools_and_invalidates_once() {
        let harness = testing::deps();
        let live = harness
            .seed_tool("live", None, ToolStatus::Published, Some(Utc::now()))
            .await;
        let draft = harness.seed_tool("draft", None, ToolStatus::Draft, None).await;
        let engine = Engine::new(Arc::new(crate::workflows::registry(&harness.build())));

        let report = engine.run_inline(FetchTools::NAME, json!({})).await.unwrap();

        assert!(report.succeeded());
        assert_eq!(harness.store.find_or_fail(live.id).await.unwrap().stars, Some(1000));
        assert_eq!(harness.store.find_or_fail(draft.id).await.unwrap().stars, None);
        assert_eq!(
            harness.cache.invalidations(),
            vec![vec!["tools".to_string(), "tool-live".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_missing_repository_is_skipped() {
        let harness = testing::deps();
        let tool = harness
            .seed_tool("gone", None, ToolStatus::Scheduled, Some(Utc::now()))
            .await;
        harness.repositories.set_missing(true);
        let engine = Engine::new(Arc::new(crate::workflows::registry(&harness.build())));

        let report = engine.run_inline(FetchTools::NAME, json!({})).await.unwrap();

        assert!(report.succeeded());
        assert!(report.caught.is_empty());
        assert!(harness.store.updates_for(tool.id).is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_still_invalidates_listing() {
        let harness = testing::deps();
        harness
            .seed_tool("live", None, ToolStatus::Published, Some(Utc::now()))
            .await;
        harness.repositories.set_failing(true);
        let engine = Engine::new(Arc::new(crate::workflows::registry(&harness.build())));

        let report = engine.run_inline(FetchTools::NAME, json!({})).await.unwrap();

        assert!(report.succeeded());
        assert_eq!(report.attempts, 2);
        assert_eq!(harness.repositories.calls(), 2);
        assert_eq!(report.caught[0].label, "fetch-repository-data-live");
        assert_eq!(harness.cache.invalidations(), vec![vec!["tools".to_string()]]);
    }

    #[tokio::test]
    async fn test_recovered_refresh_is_invalidated() {
        let harness = testing::deps();
        let live = harness
            .seed_tool("live", None, ToolStatus::Published, Some(Utc::now()))
            .await;
        harness.repositories.fail_next(1);
        let engine = Engine::new(Arc::new(crate::workflows::registry(&harness.build())));

        let report = engine.run_inline(FetchTools::NAME, json!({})).await.unwrap();

        assert!(report.succeeded());
        assert_eq!(report.attempts, 2);
        assert!(report.caught.is_empty());
        assert_eq!(harness.store.find_or_fail(live.id).await.unwrap().stars, Some(1000));
        assert_eq!(
            harness.cache.invalidations(),
            vec![
                vec!["tools".to_string()],
                vec!["tools".to_string(), "tool-live".to_string()],
            ]
        );
    }
}
