//! Enrichment units shared by the onboarding workflow and admin actions
//!
//! Each function owns a disjoint subset of the tool's fields, which is what
//! lets the onboarding workflow run them side by side without a
//! transaction:
//!
//! | unit                    | writes                                           |
//! |-------------------------|--------------------------------------------------|
//! | `generate_content`      | tagline, description, content, categories, alternatives |
//! | `fetch_repository_data` | stars, forks, score, license, commit dates       |
//! | `upload_favicon`        | favicon_url                                      |
//! | `upload_screenshot`     | screenshot_url                                   |
//! | `analyze_stack`         | stacks                                           |

use kit::FrameworkError;

use crate::models::{Term, TermKind, Tool, ToolPatch};
use crate::services::{asset_key, GeneratedContent, RepositoryData};
use crate::workflows::Deps;

pub async fn generate_content(deps: &Deps, tool: &Tool) -> Result<GeneratedContent, FrameworkError> {
    let generated = deps.content.generate(&tool.website_url).await?;

    let categories = deps
        .tools
        .resolve_terms(TermKind::Category, &generated.categories)
        .await?;
    let alternatives = deps
        .tools
        .resolve_terms(TermKind::Alternative, &generated.alternatives)
        .await?;

    deps.tools.update(tool.id, &ToolPatch::content(&generated)).await?;
    deps.tools
        .replace_categories(tool.id, &ids(&categories))
        .await?;
    deps.tools
        .replace_alternatives(tool.id, &ids(&alternatives))
        .await?;

    Ok(generated)
}

/// `None` when there was nothing to fetch; the record is left untouched
pub async fn fetch_repository_data(
    deps: &Deps,
    tool: &Tool,
) -> Result<Option<RepositoryData>, FrameworkError> {
    let Some(data) = deps.repositories.fetch(&tool.repository_url).await? else {
        tracing::info!(slug = %tool.slug, repository_url = %tool.repository_url, "no repository data, skipping");
        return Ok(None);
    };

    deps.tools.update(tool.id, &ToolPatch::repository(&data)).await?;
    Ok(Some(data))
}

pub async fn upload_favicon(deps: &Deps, tool: &Tool) -> Result<String, FrameworkError> {
    let url = deps
        .media
        .upload_favicon(&tool.website_url, &asset_key(&tool.slug, "favicon"))
        .await?;
    deps.tools.update(tool.id, &ToolPatch::favicon(url.clone())).await?;
    Ok(url)
}

pub async fn upload_screenshot(deps: &Deps, tool: &Tool) -> Result<String, FrameworkError> {
    let url = deps
        .media
        .upload_screenshot(&tool.website_url, &asset_key(&tool.slug, "screenshot"))
        .await?;
    deps.tools.update(tool.id, &ToolPatch::screenshot(url.clone())).await?;
    Ok(url)
}

pub async fn analyze_stack(deps: &Deps, tool: &Tool) -> Result<Vec<Term>, FrameworkError> {
    let slugs = deps.stacks.analyze(&tool.repository_url).await?;
    let stacks = deps.tools.resolve_terms(TermKind::Stack, &slugs).await?;
    deps.tools.replace_stacks(tool.id, &ids(&stacks)).await?;
    Ok(stacks)
}

fn ids(terms: &[Term]) -> Vec<i64> {
    terms.iter().map(|term| term.id).collect()
}
