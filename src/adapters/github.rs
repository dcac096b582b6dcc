use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::commit_diff::FileStatus;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("repository or resource not found")]
    NotFound,

    #[error("repository has no commits")]
    NoCommits,

    #[error("commit {0} is the repository's first commit and has no parent to compare against")]
    RootCommit(String),

    #[error("GitHub API error ({status}): {body}")]
    Api { status: StatusCode, body: String },

    #[error("failed to reach GitHub")]
    Http(#[from] reqwest::Error),
}

pub type GithubResult<T> = Result<T, GithubError>;

/// GitHub REST v3 client wrapper.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: Client,
    base_api: String,
    token: String,
}

impl GithubClient {
    pub fn new(token: String, base_api: Option<String>) -> GithubResult<Self> {
        let base_api = base_api.unwrap_or_else(|| "https://api.github.com".to_string());
        debug!("Creating GithubClient with base_api={}", base_api);
        let http = Client::builder()
            .user_agent(concat!("codedraft/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            base_api,
            token: format!("Bearer {token}"),
        })
    }

    pub async fn get_repository(&self, repo: &str) -> GithubResult<Repository> {
        let url = format!("{}/repos/{}", self.base_api, repo);
        self.get_json(&url, &[]).await
    }

    /// Newest commit on the default branch. The commit list endpoint is
    /// ordered newest-first, so one entry is enough.
    pub async fn latest_commit(&self, repo: &str) -> GithubResult<CommitSummary> {
        let url = format!("{}/repos/{}/commits", self.base_api, repo);
        let commits: Vec<CommitListItem> = self.get_json(&url, &[("per_page", "1")]).await?;
        let item = commits.into_iter().next().ok_or(GithubError::NoCommits)?;
        Ok(item.into_summary())
    }

    /// Commit metadata plus the list of files it touched.
    pub async fn get_commit(&self, repo: &str, sha: &str) -> GithubResult<CommitDetail> {
        let url = format!("{}/repos/{}/commits/{}", self.base_api, repo, sha);
        let raw: RawCommitDetail = self.get_json(&url, &[]).await?;
        Ok(CommitDetail {
            sha: raw.sha,
            parents: raw.parents.into_iter().map(|p| p.sha).collect(),
            files: raw.files,
        })
    }

    /// File content at a specific ref. `Ok(None)` when the path does not
    /// exist at that ref; binary content is replaced lossily.
    pub async fn get_file_content(
        &self,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> GithubResult<Option<String>> {
        let url = format!("{}/repos/{}/contents/{}", self.base_api, repo, path);
        debug!("GitHub get_file_content: url={}, ref={}", url, git_ref);

        let response = self
            .http
            .get(&url)
            .query(&[("ref", git_ref)])
            .header("Authorization", &self.token)
            .header("Accept", "application/vnd.github.v3.raw")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            Ok(None)
        } else if !status.is_success() {
            Err(GithubError::Api {
                status,
                body: response.text().await.unwrap_or_default(),
            })
        } else {
            let bytes = response.bytes().await?;
            Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> GithubResult<T> {
        debug!("GitHub GET {}", url);
        let response = self
            .http
            .get(url)
            .query(query)
            .header("Authorization", &self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            Err(GithubError::NotFound)
        } else if !status.is_success() {
            Err(GithubError::Api {
                status,
                body: response.text().await.unwrap_or_default(),
            })
        } else {
            Ok(response.json().await?)
        }
    }
}

/// Repository metadata (subset).
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub default_branch: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitSummary {
    pub sha: String,
    pub message: String,
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CommitDetail {
    pub sha: String,
    pub parents: Vec<String>,
    pub files: Vec<CommitFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitFile {
    pub filename: String,
    pub status: FileStatus,
}

#[derive(Deserialize)]
struct CommitListItem {
    sha: String,
    commit: CommitInner,
}

#[derive(Deserialize)]
struct CommitInner {
    message: String,
    author: Option<CommitAuthor>,
}

#[derive(Deserialize)]
struct CommitAuthor {
    name: String,
    date: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawCommitDetail {
    sha: String,
    #[serde(default)]
    parents: Vec<ParentRef>,
    #[serde(default)]
    files: Vec<CommitFile>,
}

#[derive(Deserialize)]
struct ParentRef {
    sha: String,
}

impl CommitListItem {
    fn into_summary(self) -> CommitSummary {
        let (author, date) = match self.commit.author {
            Some(a) => (Some(a.name), Some(a.date)),
            None => (None, None),
        };
        CommitSummary {
            sha: self.sha,
            message: self.commit.message,
            author,
            date,
        }
    }
}
