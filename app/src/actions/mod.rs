//! Admin actions and public submission
//!
//! Every action touches only its own fields, so any of them can be re-run
//! on its own when an onboarding step left a field empty.

pub mod submit_tool;
pub mod tools;

pub use submit_tool::{SubmitToolAction, SubmitToolInput};
pub use tools::{
    AnalyzeToolStackAction, CreateToolAction, DeleteToolsAction, FeatureToolAction,
    RefreshToolRepositoryAction, RegenerateToolContentAction, ReuploadToolAssetsAction,
    ScheduleToolAction, UpdateToolAction, UpdateToolInput,
};

use crate::services::tags;
use crate::workflows::Deps;

/// Invalidate the listings and the tool page; a failure is only logged
pub(crate) async fn revalidate(deps: &Deps, slug: &str) {
    let cache_tags = [tags::TOOLS.to_string(), tags::tool(slug)];
    if let Err(err) = deps.cache.invalidate(&cache_tags).await {
        tracing::warn!(slug, error = %err, "cache invalidation failed");
    }
}
