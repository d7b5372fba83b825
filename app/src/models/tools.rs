//! Tools model
//!
//! Custom behavior for the `tools` entity. The columns live in
//! src/models/entities/tools.rs.

pub use super::entities::tools::*;

use chrono::{NaiveDateTime, Utc};
use kit::FrameworkError;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Unchanged, Set};

use super::tool::{NewTool, Tool, ToolPatch, ToolStatus};

impl ActiveModelBehavior for ActiveModel {}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl TryFrom<Model> for Tool {
    type Error = FrameworkError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let status = ToolStatus::parse(&model.status).ok_or_else(|| {
            FrameworkError::internal(format!(
                "tool {} has unknown status '{}'",
                model.slug, model.status
            ))
        })?;

        Ok(Tool {
            id: model.id,
            name: model.name,
            slug: model.slug,
            website_url: model.website_url,
            repository_url: model.repository_url,
            tagline: model.tagline,
            description: model.description,
            content: model.content,
            submitter_name: model.submitter_name,
            submitter_email: model.submitter_email,
            status,
            published_at: model.published_at.map(|at| at.and_utc()),
            is_featured: model.is_featured,
            stars: model.stars,
            forks: model.forks,
            score: model.score,
            license: model.license,
            first_commit_date: model.first_commit_date.map(|at| at.and_utc()),
            last_commit_date: model.last_commit_date.map(|at| at.and_utc()),
            favicon_url: model.favicon_url,
            screenshot_url: model.screenshot_url,
            created_at: model.created_at.and_utc(),
            updated_at: model.updated_at.and_utc(),
        })
    }
}

// ============================================================================
// WRITE OPERATIONS
// ============================================================================

impl ActiveModel {
    /// Insertable row for a new tool
    pub fn from_new(input: &NewTool, slug: String) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            name: Set(input.name.trim().to_string()),
            slug: Set(slug),
            website_url: Set(input.website_url.clone()),
            repository_url: Set(input.repository_url.clone()),
            tagline: Set(input.tagline.clone()),
            description: Set(input.description.clone()),
            submitter_name: Set(input.submitter_name.clone()),
            submitter_email: Set(input.submitter_email.clone()),
            status: Set(input.initial_status().as_str().to_string()),
            published_at: Set(input.published_at.map(|at| at.naive_utc())),
            is_featured: Set(input.is_featured),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
    }

    /// Update that writes only the columns present in `patch`
    ///
    /// Columns left out stay `NotSet`, so two patches touching disjoint
    /// fields of the same row never overwrite each other.
    pub fn from_patch(id: i64, patch: &ToolPatch) -> Self {
        fn naive(at: &chrono::DateTime<Utc>) -> Option<NaiveDateTime> {
            Some(at.naive_utc())
        }

        let mut active = Self {
            id: Unchanged(id),
            updated_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        };

        if let Some(v) = &patch.name {
            active.name = Set(v.clone());
        }
        if let Some(v) = &patch.website_url {
            active.website_url = Set(v.clone());
        }
        if let Some(v) = &patch.repository_url {
            active.repository_url = Set(v.clone());
        }
        if let Some(v) = &patch.tagline {
            active.tagline = Set(Some(v.clone()));
        }
        if let Some(v) = &patch.description {
            active.description = Set(Some(v.clone()));
        }
        if let Some(v) = &patch.content {
            active.content = Set(Some(v.clone()));
        }
        if let Some(v) = &patch.submitter_name {
            active.submitter_name = Set(Some(v.clone()));
        }
        if let Some(v) = &patch.submitter_email {
            active.submitter_email = Set(Some(v.clone()));
        }
        if let Some(v) = patch.status {
            active.status = Set(v.as_str().to_string());
        }
        if let Some(v) = &patch.published_at {
            active.published_at = Set(naive(v));
        }
        if let Some(v) = patch.is_featured {
            active.is_featured = Set(v);
        }
        if let Some(v) = patch.stars {
            active.stars = Set(Some(v));
        }
        if let Some(v) = patch.forks {
            active.forks = Set(Some(v));
        }
        if let Some(v) = patch.score {
            active.score = Set(Some(v));
        }
        if let Some(v) = &patch.license {
            active.license = Set(Some(v.clone()));
        }
        if let Some(v) = &patch.first_commit_date {
            active.first_commit_date = Set(naive(v));
        }
        if let Some(v) = &patch.last_commit_date {
            active.last_commit_date = Set(naive(v));
        }
        if let Some(v) = &patch.favicon_url {
            active.favicon_url = Set(Some(v.clone()));
        }
        if let Some(v) = &patch.screenshot_url {
            active.screenshot_url = Set(Some(v.clone()));
        }

        active
    }
}
