//! The tool record and the rules for changing it

use chrono::{DateTime, Utc};
use kit::FrameworkError;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::content::GeneratedContent;
use crate::services::github::RepositoryData;

/// Lifecycle of a listing; it only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolStatus {
    Draft,
    Scheduled,
    Published,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Scheduled => "Scheduled",
            Self::Published => "Published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Draft" => Some(Self::Draft),
            "Scheduled" => Some(Self::Scheduled),
            "Published" => Some(Self::Published),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Scheduled => 1,
            Self::Published => 2,
        }
    }

    /// Staying put is allowed so rescheduling and replays are no-ops
    pub fn can_transition_to(&self, next: ToolStatus) -> bool {
        next.rank() >= self.rank()
    }
}

impl std::fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub website_url: String,
    pub repository_url: String,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub submitter_name: Option<String>,
    pub submitter_email: Option<String>,
    pub status: ToolStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub is_featured: bool,
    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub score: Option<i64>,
    pub license: Option<String>,
    pub first_commit_date: Option<DateTime<Utc>>,
    pub last_commit_date: Option<DateTime<Utc>>,
    pub favicon_url: Option<String>,
    pub screenshot_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tool {
    /// Merge `patch` into the record, rejecting backward status moves and
    /// publication without a date
    pub fn apply(&mut self, patch: &ToolPatch) -> Result<(), FrameworkError> {
        if let Some(status) = patch.status {
            if !self.status.can_transition_to(status) {
                return Err(FrameworkError::validation(
                    "status",
                    format!("cannot move {} from {} to {}", self.slug, self.status, status),
                ));
            }
        }

        let mut next = self.clone();
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = &patch.$field {
                    next.$field = value.clone().into();
                })*
            };
        }
        merge!(name, website_url, repository_url, status, is_featured);
        merge!(tagline, description, content, submitter_name, submitter_email);
        merge!(published_at, stars, forks, score, license);
        merge!(first_commit_date, last_commit_date, favicon_url, screenshot_url);

        if next.status == ToolStatus::Published && next.published_at.is_none() {
            return Err(FrameworkError::validation(
                "published_at",
                format!("{} cannot be published without a publication date", self.slug),
            ));
        }
        *self = next;
        Ok(())
    }
}

/// A partial update of a tool
///
/// Each enrichment step builds its patch through its own constructor so that
/// steps running side by side never write the same column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolPatch {
    pub name: Option<String>,
    pub website_url: Option<String>,
    pub repository_url: Option<String>,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub submitter_name: Option<String>,
    pub submitter_email: Option<String>,
    pub status: Option<ToolStatus>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_featured: Option<bool>,
    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub score: Option<i64>,
    pub license: Option<String>,
    pub first_commit_date: Option<DateTime<Utc>>,
    pub last_commit_date: Option<DateTime<Utc>>,
    pub favicon_url: Option<String>,
    pub screenshot_url: Option<String>,
}

impl ToolPatch {
    /// Generated copy: tagline, description and content
    pub fn content(generated: &GeneratedContent) -> Self {
        Self {
            tagline: Some(generated.tagline.clone()),
            description: Some(generated.description.clone()),
            content: Some(generated.content.clone()),
            ..Default::default()
        }
    }

    /// Repository statistics
    pub fn repository(data: &RepositoryData) -> Self {
        Self {
            stars: Some(data.stars),
            forks: Some(data.forks),
            score: Some(data.score),
            license: data.license.clone(),
            first_commit_date: data.created_at,
            last_commit_date: data.pushed_at,
            ..Default::default()
        }
    }

    pub fn favicon(url: impl Into<String>) -> Self {
        Self {
            favicon_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn screenshot(url: impl Into<String>) -> Self {
        Self {
            screenshot_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn status(status: ToolStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn schedule(published_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(ToolStatus::Scheduled),
            published_at: Some(published_at),
            ..Default::default()
        }
    }

    pub fn featured(is_featured: bool) -> Self {
        Self {
            is_featured: Some(is_featured),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Fields accepted when a tool is created
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NewTool {
    #[validate(length(min = 1, max = 120, message = "The name must be between 1 and 120 characters."))]
    pub name: String,
    /// Derived from the name when absent
    pub slug: Option<String>,
    #[validate(url(message = "The website url must be a valid URL."))]
    pub website_url: String,
    #[validate(url(message = "The repository url must be a valid URL."))]
    pub repository_url: String,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub submitter_name: Option<String>,
    #[validate(email(message = "The submitter email must be a valid email address."))]
    pub submitter_email: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_featured: bool,
}

impl NewTool {
    pub fn slug(&self) -> String {
        match &self.slug {
            Some(slug) if !slug.trim().is_empty() => slugify(slug),
            _ => slugify(&self.name),
        }
    }

    /// A publication date makes the new record scheduled right away
    pub fn initial_status(&self) -> ToolStatus {
        if self.published_at.is_some() {
            ToolStatus::Scheduled
        } else {
            ToolStatus::Draft
        }
    }
}

/// Lowercase ASCII slug with single dashes between words
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tool(status: ToolStatus) -> Tool {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        Tool {
            id: 1,
            name: "Foo".into(),
            slug: "foo".into(),
            website_url: "https://foo.dev".into(),
            repository_url: "https://github.com/foo/foo".into(),
            tagline: None,
            description: None,
            content: None,
            submitter_name: None,
            submitter_email: None,
            status,
            published_at: None,
            is_featured: false,
            stars: None,
            forks: None,
            score: None,
            license: None,
            first_commit_date: None,
            last_commit_date: None,
            favicon_url: None,
            screenshot_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_moves_forward_only() {
        assert!(ToolStatus::Draft.can_transition_to(ToolStatus::Scheduled));
        assert!(ToolStatus::Scheduled.can_transition_to(ToolStatus::Published));
        assert!(ToolStatus::Scheduled.can_transition_to(ToolStatus::Scheduled));
        assert!(!ToolStatus::Published.can_transition_to(ToolStatus::Scheduled));
        assert!(!ToolStatus::Scheduled.can_transition_to(ToolStatus::Draft));
    }

    #[test]
    fn test_apply_rejects_backward_move() {
        let mut published = tool(ToolStatus::Published);
        published.published_at = Some(Utc::now());

        let err = published.apply(&ToolPatch::status(ToolStatus::Draft)).unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert_eq!(published.status, ToolStatus::Published);
    }

    #[test]
    fn test_apply_requires_publication_date() {
        let mut draft = tool(ToolStatus::Draft);
        assert!(draft.apply(&ToolPatch::status(ToolStatus::Published)).is_err());
        assert_eq!(draft.status, ToolStatus::Draft);

        let mut scheduled = tool(ToolStatus::Draft);
        let at = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
        scheduled.apply(&ToolPatch::schedule(at)).unwrap();
        scheduled.apply(&ToolPatch::status(ToolStatus::Published)).unwrap();
        assert_eq!(scheduled.status, ToolStatus::Published);
        assert_eq!(scheduled.published_at, Some(at));
    }

    #[test]
    fn test_apply_touches_only_patched_fields() {
        let mut record = tool(ToolStatus::Scheduled);
        record.tagline = Some("Existing".into());

        record.apply(&ToolPatch::favicon("https://cdn/foo/favicon.png")).unwrap();

        assert_eq!(record.favicon_url.as_deref(), Some("https://cdn/foo/favicon.png"));
        assert_eq!(record.tagline.as_deref(), Some("Existing"));
        assert!(record.screenshot_url.is_none());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Foo"), "foo");
        assert_eq!(slugify("  Cal.com  Scheduling! "), "cal-com-scheduling");
        assert_eq!(slugify("n8n"), "n8n");
        assert_eq!(slugify("--"), "");
    }

    #[test]
    fn test_new_tool_status_and_slug() {
        let mut input = NewTool {
            name: "Plausible Analytics".into(),
            ..Default::default()
        };
        assert_eq!(input.slug(), "plausible-analytics");
        assert_eq!(input.initial_status(), ToolStatus::Draft);

        input.slug = Some("plausible".into());
        input.published_at = Some(Utc::now());
        assert_eq!(input.slug(), "plausible");
        assert_eq!(input.initial_status(), ToolStatus::Scheduled);
    }
}
