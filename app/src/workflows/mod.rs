//! The five workflows of the pipeline
//!
//! | workflow         | trigger              | attempts |
//! |------------------|----------------------|----------|
//! | `tool.scheduled` | event                | 2        |
//! | `tool.featured`  | event                | 3        |
//! | `tool.deleted`   | event                | 3        |
//! | `publish-tools`  | cron, every 2 hours  | 3        |
//! | `fetch-tools`    | cron, nightly        | 2        |

mod fetch_tools;
mod publish_tools;
mod tool_deleted;
mod tool_featured;
mod tool_scheduled;

pub use fetch_tools::FetchTools;
pub use publish_tools::PublishTools;
pub use tool_deleted::ToolDeleted;
pub use tool_featured::ToolFeatured;
pub use tool_scheduled::ToolScheduled;

use kit::{FrameworkError, RetryPolicy, WorkflowRegistry};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::SiteConfig;
use crate::events::EventBus;
use crate::notifications::Notifier;
use crate::repositories::ToolStore;
use crate::services::{
    CacheInvalidator, ContentGenerator, MediaUploader, RepositoryFetcher, StackAnalyzer,
};

/// Collaborators injected into every workflow and action
#[derive(Clone)]
pub struct Deps {
    pub tools: Arc<dyn ToolStore>,
    pub repositories: Arc<dyn RepositoryFetcher>,
    pub content: Arc<dyn ContentGenerator>,
    pub media: Arc<dyn MediaUploader>,
    pub stacks: Arc<dyn StackAnalyzer>,
    pub cache: Arc<dyn CacheInvalidator>,
    pub notifier: Notifier,
    pub events: Arc<dyn EventBus>,
    pub site: SiteConfig,
}

/// Registry holding every workflow, sharing one set of collaborators
pub fn registry(deps: &Deps) -> WorkflowRegistry {
    let mut registry = WorkflowRegistry::new();
    registry
        .register(ToolScheduled::new(deps.clone()))
        .register(ToolFeatured::new(deps.clone()))
        .register(ToolDeleted::new(deps.clone()))
        .register(PublishTools::new(deps.clone()))
        .register(FetchTools::new(deps.clone()));
    registry
}

/// Retry policy of a workflow by name, known without building it
pub fn retry_policy(name: &str) -> RetryPolicy {
    match name {
        ToolScheduled::NAME => ToolScheduled::policy(),
        ToolFeatured::NAME => ToolFeatured::policy(),
        ToolDeleted::NAME => ToolDeleted::policy(),
        PublishTools::NAME => PublishTools::policy(),
        FetchTools::NAME => FetchTools::policy(),
        _ => RetryPolicy::default(),
    }
}

#[derive(Debug, Deserialize)]
struct SlugInput {
    slug: String,
}

/// Extract the tool slug from an event payload
pub(crate) fn slug_input(input: Value) -> Result<String, FrameworkError> {
    let SlugInput { slug } = serde_json::from_value(input)
        .map_err(|_| FrameworkError::validation("slug", "The event payload has no slug."))?;
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use serde_json::json;

    #[test]
    fn test_registry_knows_every_workflow() {
        let registry = registry(&testing::deps().build());

        assert_eq!(
            registry.names(),
            vec!["fetch-tools", "publish-tools", "tool.deleted", "tool.featured", "tool.scheduled"]
        );
        assert_eq!(registry.concurrency_limits().get("tool.scheduled"), Some(&2));
    }

    #[test]
    fn test_retry_policy_by_name() {
        assert_eq!(retry_policy("tool.scheduled").max_attempts, 2);
        assert_eq!(retry_policy("publish-tools").max_attempts, 3);
        assert_eq!(retry_policy("unknown"), RetryPolicy::default());
    }

    #[test]
    fn test_slug_input() {
        assert_eq!(slug_input(json!({ "slug": "foo" })).unwrap(), "foo");
        assert!(slug_input(json!({ "id": 1 })).unwrap_err().is_fatal());
    }
}
