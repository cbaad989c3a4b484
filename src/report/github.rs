//! GitHub REST API client for commit activity and stargazers

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::stats::normalize::parse_date;

/// Default base URL for GitHub API
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

static REPO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"github\.com[/:]([^/\s]+)/([^/\s]+?)(?:\.git)?/?$").expect("valid regex")
});

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Not a GitHub repository URL: {0}")]
    InvalidRepoUrl(String),
}

/// Owner and name of a GitHub repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parses `https://github.com/owner/repo` style URLs
    pub fn parse(url: &str) -> Result<Self, GitHubError> {
        let captures = REPO_URL
            .captures(url.trim())
            .ok_or_else(|| GitHubError::InvalidRepoUrl(url.to_string()))?;

        Ok(Self {
            owner: captures[1].to_string(),
            name: captures[2].to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    #[serde(default)]
    commit: Option<CommitDetail>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    #[serde(default)]
    date: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    #[serde(default)]
    stargazers_count: u64,
}

pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, GitHubError> {
        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent("pkgstats")
                .timeout(REQUEST_TIMEOUT)
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, GitHubError> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("token {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("GitHub API returned status {}: {}", status, url);
            return Err(GitHubError::Status {
                status,
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// Commits per day over the last `days` days ending at `today`, zero-filled.
    ///
    /// Only the latest 100 commits are inspected.
    pub async fn daily_commits(
        &self,
        repo: &RepoRef,
        days: u32,
        today: NaiveDate,
    ) -> Result<Vec<(NaiveDate, u64)>, GitHubError> {
        let url = format!(
            "{}/repos/{}/{}/commits?per_page=100",
            self.base_url, repo.owner, repo.name
        );
        info!("GitHub: fetching commits for {}/{}", repo.owner, repo.name);

        let commits: Vec<CommitItem> = self.get(&url).await?.json().await?;

        let window: Vec<NaiveDate> = (0..days)
            .filter_map(|i| today.checked_sub_days(Days::new(u64::from(days - i - 1))))
            .collect();
        let mut counts: BTreeMap<NaiveDate, u64> =
            window.iter().map(|date| (*date, 0)).collect();

        for date in commits.iter().filter_map(|item| {
            item.commit
                .as_ref()?
                .author
                .as_ref()?
                .date
                .as_ref()
                .and_then(parse_date)
        }) {
            if let Some(count) = counts.get_mut(&date) {
                *count += 1;
            }
        }

        Ok(counts.into_iter().collect())
    }

    /// Current stargazer count of a repository
    pub async fn stargazers(&self, repo: &RepoRef) -> Result<u64, GitHubError> {
        let url = format!("{}/repos/{}/{}", self.base_url, repo.owner, repo.name);
        let info: RepoResponse = self.get(&url).await?.json().await?;
        Ok(info.stargazers_count)
    }
}
