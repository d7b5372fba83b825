//! Repository metadata from the GitHub REST API

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kit::FrameworkError;
use serde::{Deserialize, Serialize};

use super::ensure_success;

const GITHUB_API_URL: &str = "https://api.github.com";

/// Statistics copied onto a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryData {
    pub stars: i64,
    pub forks: i64,
    pub score: i64,
    /// SPDX identifier, `None` when no license was detected
    pub license: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    /// `None` means "nothing to update": the URL is not a repository or the
    /// repository does not exist
    async fn fetch(&self, repository_url: &str) -> Result<Option<RepositoryData>, FrameworkError>;
}

pub struct GithubClient {
    http: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

impl GithubClient {
    pub fn new(http: reqwest::Client, token: Option<String>) -> Self {
        Self {
            http,
            token,
            base_url: GITHUB_API_URL.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct GithubRepository {
    stargazers_count: i64,
    forks_count: i64,
    created_at: Option<DateTime<Utc>>,
    pushed_at: Option<DateTime<Utc>>,
    license: Option<GithubLicense>,
}

#[derive(Deserialize)]
struct GithubLicense {
    spdx_id: Option<String>,
}

#[async_trait]
impl RepositoryFetcher for GithubClient {
    async fn fetch(&self, repository_url: &str) -> Result<Option<RepositoryData>, FrameworkError> {
        let Some((owner, name)) = parse_repository(repository_url) else {
            tracing::debug!(repository_url, "not a GitHub repository, skipping");
            return Ok(None);
        };

        let mut request = self
            .http
            .get(format!("{}/repos/{}/{}", self.base_url, owner, name))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if matches!(response.status().as_u16(), 404 | 451) {
            tracing::info!(repository_url, "repository not found");
            return Ok(None);
        }

        let repo: GithubRepository = ensure_success("github", response).await?.json().await?;
        let license = repo
            .license
            .and_then(|license| license.spdx_id)
            .filter(|id| id != "NOASSERTION");

        Ok(Some(RepositoryData {
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            score: repository_score(repo.stargazers_count, repo.forks_count, repo.pushed_at, Utc::now()),
            license,
            created_at: repo.created_at,
            pushed_at: repo.pushed_at,
        }))
    }
}

/// `(owner, name)` of a `github.com/owner/name` URL
pub fn parse_repository(url: &str) -> Option<(String, String)> {
    let rest = url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.");
    let path = rest.strip_prefix("github.com/")?;

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let name = segments.next()?;
    let name = name.split(['?', '#']).next().unwrap_or(name);
    let name = name.trim_end_matches(".git");

    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some((owner.to_string(), name.to_string()))
}

/// Popularity weighted by activity
///
/// Stars plus twice the forks, scaled down as the last push ages. The
/// activity factor halves every 180 days but never drops below one half.
pub fn repository_score(
    stars: i64,
    forks: i64,
    pushed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i64 {
    let idle_days = pushed_at
        .map(|at| (now - at).num_days().max(0))
        .unwrap_or(365) as f64;
    let activity = 0.5 + 0.5 * 0.5f64.powf(idle_days / 180.0);
    ((stars + forks * 2) as f64 * activity).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_parse_repository() {
        assert_eq!(
            parse_repository("https://github.com/supabase/supabase"),
            Some(("supabase".into(), "supabase".into()))
        );
        assert_eq!(
            parse_repository("https://www.github.com/calcom/cal.com.git/"),
            Some(("calcom".into(), "cal.com".into()))
        );
        assert_eq!(
            parse_repository("github.com/n8n-io/n8n/tree/master?tab=readme"),
            Some(("n8n-io".into(), "n8n".into()))
        );
        assert_eq!(parse_repository("https://gitlab.com/foo/bar"), None);
        assert_eq!(parse_repository("https://github.com/only-owner"), None);
    }

    #[test]
    fn test_score_decays_with_inactivity() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let fresh = repository_score(1000, 100, Some(now), now);
        let stale = repository_score(1000, 100, Some(now - Duration::days(360)), now);
        let unknown = repository_score(1000, 100, None, now);

        assert_eq!(fresh, 1200);
        assert_eq!(stale, 750);
        assert!(unknown < fresh);
        assert!(unknown >= 600);
    }
}
