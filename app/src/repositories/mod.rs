//! The ToolRecord store
//!
//! Workflows and actions only see [`ToolStore`]; production uses
//! [`SeaOrmToolStore`], tests use [`MemoryToolStore`].

mod database;
mod memory;

pub use database::SeaOrmToolStore;
pub use memory::MemoryToolStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kit::FrameworkError;

use crate::models::{NewTool, Term, TermKind, Tool, ToolPatch, ToolStatus};

/// Criteria for [`ToolStore::find_many`]
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    /// Any of these statuses; empty matches every status
    pub statuses: Vec<ToolStatus>,
    /// Only tools with `published_at <= published_before`
    pub published_before: Option<DateTime<Utc>>,
}

impl ToolFilter {
    /// Scheduled tools whose publication date has passed
    pub fn due_for_publication(now: DateTime<Utc>) -> Self {
        Self {
            statuses: vec![ToolStatus::Scheduled],
            published_before: Some(now),
        }
    }

    /// Tools shown on the site now or soon
    pub fn listed() -> Self {
        Self {
            statuses: vec![ToolStatus::Published, ToolStatus::Scheduled],
            published_before: None,
        }
    }

    pub fn matches(&self, tool: &Tool) -> bool {
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&tool.status);
        let date_ok = match self.published_before {
            Some(cutoff) => tool.published_at.is_some_and(|at| at <= cutoff),
            None => true,
        };
        status_ok && date_ok
    }
}

#[async_trait]
pub trait ToolStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Tool>, FrameworkError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tool>, FrameworkError>;

    /// Matching tools ordered by publication date, then id
    async fn find_many(&self, filter: &ToolFilter) -> Result<Vec<Tool>, FrameworkError>;

    /// Insert a tool; fails validation when the slug is taken
    async fn create(&self, input: &NewTool) -> Result<Tool, FrameworkError>;

    /// Merge `patch` into the tool, writing only the patched columns
    async fn update(&self, id: i64, patch: &ToolPatch) -> Result<Tool, FrameworkError>;

    /// Delete tools and their term links, returning what was deleted
    async fn delete_many(&self, ids: &[i64]) -> Result<Vec<Tool>, FrameworkError>;

    /// Find terms by name or slug, creating the missing ones
    async fn resolve_terms(
        &self,
        kind: TermKind,
        names: &[String],
    ) -> Result<Vec<Term>, FrameworkError>;

    /// Replace the tool's links of one kind with exactly `term_ids`
    async fn replace_terms(
        &self,
        kind: TermKind,
        tool_id: i64,
        term_ids: &[i64],
    ) -> Result<(), FrameworkError>;

    /// Terms of one kind linked to the tool, ordered by name
    async fn terms(&self, kind: TermKind, tool_id: i64) -> Result<Vec<Term>, FrameworkError>;

    async fn find_by_slug_or_fail(&self, slug: &str) -> Result<Tool, FrameworkError> {
        self.find_by_slug(slug)
            .await?
            .ok_or_else(|| FrameworkError::model_not_found(format!("Tool '{}'", slug)))
    }

    async fn find_or_fail(&self, id: i64) -> Result<Tool, FrameworkError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| FrameworkError::model_not_found(format!("Tool #{}", id)))
    }

    async fn replace_categories(&self, tool_id: i64, ids: &[i64]) -> Result<(), FrameworkError> {
        self.replace_terms(TermKind::Category, tool_id, ids).await
    }

    async fn replace_alternatives(&self, tool_id: i64, ids: &[i64]) -> Result<(), FrameworkError> {
        self.replace_terms(TermKind::Alternative, tool_id, ids).await
    }

    async fn replace_stacks(&self, tool_id: i64, ids: &[i64]) -> Result<(), FrameworkError> {
        self.replace_terms(TermKind::Stack, tool_id, ids).await
    }
}
