//! Admin actions on stored tools

use chrono::{DateTime, Utc};
use futures::future::try_join;
use kit::FrameworkError;
use serde::Deserialize;
use validator::Validate;

use super::revalidate;
use crate::enrichment;
use crate::events::Event;
use crate::models::{NewTool, Term, Tool, ToolPatch, ToolStatus};
use crate::workflows::Deps;

pub struct CreateToolAction {
    deps: Deps,
}

impl CreateToolAction {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    /// Create a tool; one created with a publication date starts onboarding
    pub async fn execute(&self, input: &NewTool) -> Result<Tool, FrameworkError> {
        input.validate()?;
        let tool = self.deps.tools.create(input).await?;

        if tool.status == ToolStatus::Scheduled {
            self.deps
                .events
                .send(&Event::ToolScheduled { slug: tool.slug.clone() })
                .await?;
        }

        revalidate(&self.deps, &tool.slug).await;
        Ok(tool)
    }
}

/// Field changes plus optional full replacement of the relations
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateToolInput {
    #[serde(flatten)]
    pub patch: ToolPatch,
    pub categories: Option<Vec<i64>>,
    pub alternatives: Option<Vec<i64>>,
}

pub struct UpdateToolAction {
    deps: Deps,
}

impl UpdateToolAction {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    pub async fn execute(&self, id: i64, input: &UpdateToolInput) -> Result<Tool, FrameworkError> {
        let tools = &self.deps.tools;
        let tool = if input.patch.is_empty() {
            tools.find_or_fail(id).await?
        } else {
            tools.update(id, &input.patch).await?
        };

        if let Some(ids) = &input.categories {
            tools.replace_categories(id, ids).await?;
        }
        if let Some(ids) = &input.alternatives {
            tools.replace_alternatives(id, ids).await?;
        }

        revalidate(&self.deps, &tool.slug).await;
        Ok(tool)
    }
}

pub struct ScheduleToolAction {
    deps: Deps,
}

impl ScheduleToolAction {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    /// Set the publication date and start onboarding
    ///
    /// Only drafts and already scheduled tools can be (re)scheduled.
    pub async fn execute(&self, id: i64, published_at: DateTime<Utc>) -> Result<Tool, FrameworkError> {
        let tool = self
            .deps
            .tools
            .update(id, &ToolPatch::schedule(published_at))
            .await?;

        self.deps
            .events
            .send(&Event::ToolScheduled { slug: tool.slug.clone() })
            .await?;

        revalidate(&self.deps, &tool.slug).await;
        Ok(tool)
    }
}

pub struct FeatureToolAction {
    deps: Deps,
}

impl FeatureToolAction {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    pub async fn execute(&self, id: i64) -> Result<Tool, FrameworkError> {
        let tool = self.deps.tools.update(id, &ToolPatch::featured(true)).await?;

        self.deps
            .events
            .send(&Event::ToolFeatured { slug: tool.slug.clone() })
            .await?;

        revalidate(&self.deps, &tool.slug).await;
        Ok(tool)
    }
}

pub struct DeleteToolsAction {
    deps: Deps,
}

impl DeleteToolsAction {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    pub async fn execute(&self, ids: &[i64]) -> Result<Vec<Tool>, FrameworkError> {
        let deleted = self.deps.tools.delete_many(ids).await?;

        for tool in &deleted {
            self.deps
                .events
                .send(&Event::ToolDeleted { slug: tool.slug.clone() })
                .await?;
            revalidate(&self.deps, &tool.slug).await;
        }

        tracing::info!(count = deleted.len(), "tools deleted");
        Ok(deleted)
    }
}

pub struct ReuploadToolAssetsAction {
    deps: Deps,
}

impl ReuploadToolAssetsAction {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    /// Replace the favicon and screenshot at their usual keys
    pub async fn execute(&self, id: i64) -> Result<Tool, FrameworkError> {
        let tool = self.deps.tools.find_or_fail(id).await?;

        try_join(
            enrichment::upload_favicon(&self.deps, &tool),
            enrichment::upload_screenshot(&self.deps, &tool),
        )
        .await?;

        revalidate(&self.deps, &tool.slug).await;
        self.deps.tools.find_or_fail(id).await
    }
}

pub struct RegenerateToolContentAction {
    deps: Deps,
}

impl RegenerateToolContentAction {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    pub async fn execute(&self, id: i64) -> Result<Tool, FrameworkError> {
        let tool = self.deps.tools.find_or_fail(id).await?;
        enrichment::generate_content(&self.deps, &tool).await?;

        revalidate(&self.deps, &tool.slug).await;
        self.deps.tools.find_or_fail(id).await
    }
}

pub struct RefreshToolRepositoryAction {
    deps: Deps,
}

impl RefreshToolRepositoryAction {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    pub async fn execute(&self, id: i64) -> Result<Tool, FrameworkError> {
        let tool = self.deps.tools.find_or_fail(id).await?;
        if enrichment::fetch_repository_data(&self.deps, &tool).await?.is_none() {
            return Ok(tool);
        }

        revalidate(&self.deps, &tool.slug).await;
        self.deps.tools.find_or_fail(id).await
    }
}

pub struct AnalyzeToolStackAction {
    deps: Deps,
}

impl AnalyzeToolStackAction {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    pub async fn execute(&self, id: i64) -> Result<Vec<Term>, FrameworkError> {
        let tool = self.deps.tools.find_or_fail(id).await?;
        let stacks = enrichment::analyze_stack(&self.deps, &tool).await?;

        revalidate(&self.deps, &tool.slug).await;
        Ok(stacks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TermKind;
    use crate::repositories::ToolStore;
    use crate::testing;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_schedule_emits_event() {
        let harness = testing::deps();
        let draft = harness.seed_tool("foo", None, ToolStatus::Draft, None).await;
        let action = ScheduleToolAction::new(harness.build());

        let at = Utc::now();
        let tool = action.execute(draft.id, at).await.unwrap();

        assert_eq!(tool.status, ToolStatus::Scheduled);
        assert_eq!(tool.published_at, Some(at));
        assert_eq!(
            harness.events.sent(),
            vec![Event::ToolScheduled { slug: "foo".into() }]
        );
        assert_eq!(harness.cache.count("tool-foo"), 1);
    }

    #[tokio::test]
    async fn test_published_tool_cannot_be_rescheduled() {
        let harness = testing::deps();
        let live = harness
            .seed_tool("foo", None, ToolStatus::Published, Some(Utc::now()))
            .await;
        let action = ScheduleToolAction::new(harness.build());

        let err = action.execute(live.id, Utc::now()).await.unwrap_err();

        assert_eq!(err.status_code(), 422);
        assert!(harness.events.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reupload_touches_only_assets() {
        let harness = testing::deps();
        let tool = harness.seed_tool("foo", None, ToolStatus::Draft, None).await;
        let action = ReuploadToolAssetsAction::new(harness.build());

        let updated = action.execute(tool.id).await.unwrap();

        assert_eq!(
            updated.favicon_url.as_deref(),
            Some("https://cdn.openalternative.test/tools/foo/favicon.png")
        );
        assert_eq!(
            updated.screenshot_url.as_deref(),
            Some("https://cdn.openalternative.test/tools/foo/screenshot.png")
        );
        assert_eq!(updated.tagline, None);
        assert_eq!(updated.stars, None);
    }

    #[tokio::test]
    async fn test_regenerate_replaces_relations() {
        let harness = testing::deps();
        let tool = harness.seed_tool("foo", None, ToolStatus::Draft, None).await;
        let stale = harness
            .store
            .resolve_terms(TermKind::Category, &["Stale".to_string()])
            .await
            .unwrap();
        harness.store.replace_categories(tool.id, &[stale[0].id]).await.unwrap();
        let action = RegenerateToolContentAction::new(harness.build());

        let updated = action.execute(tool.id).await.unwrap();

        assert_eq!(updated.tagline.as_deref(), Some("Open source workspace for notes"));
        let names: Vec<String> = harness
            .store
            .terms(TermKind::Category, tool.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Note Taking".to_string(), "Productivity".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_repository_leaves_tool_untouched() {
        let harness = testing::deps();
        let tool = harness.seed_tool("foo", None, ToolStatus::Draft, None).await;
        harness.repositories.set_missing(true);
        let action = RefreshToolRepositoryAction::new(harness.build());

        let unchanged = action.execute(tool.id).await.unwrap();

        assert_eq!(unchanged, tool);
        assert!(harness.cache.invalidations().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_stack_links_terms() {
        let harness = testing::deps();
        let tool = harness.seed_tool("foo", None, ToolStatus::Draft, None).await;
        let action = AnalyzeToolStackAction::new(harness.build());

        let stacks = action.execute(tool.id).await.unwrap();

        let slugs: Vec<&str> = stacks.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, vec!["react", "postgresql"]);
        assert_eq!(harness.stacks.calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_emits_event_per_tool() {
        let harness = testing::deps();
        let foo = harness.seed_tool("foo", None, ToolStatus::Draft, None).await;
        let bar = harness.seed_tool("bar", None, ToolStatus::Draft, None).await;
        let action = DeleteToolsAction::new(harness.build());

        let deleted = action.execute(&[foo.id, bar.id]).await.unwrap();

        assert_eq!(deleted.len(), 2);
        assert_eq!(harness.events.sent().len(), 2);
        assert!(harness.store.find_by_slug("foo").await.unwrap().is_none());
    }
}
