use crate::adapters::github::{CommitSummary, GithubClient, GithubError, GithubResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Change status of one file in a commit. GitHub's extra statuses
/// (renamed, copied, changed) collapse into `Modified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Removed,
    #[serde(other)]
    Modified,
}

/// Per-file before/after content for one commit. `before` is empty for
/// added files, `after` is empty for removed files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub status: FileStatus,
    pub before: String,
    pub after: String,
}

pub struct CommitDiffer {
    client: GithubClient,
}

impl CommitDiffer {
    pub fn new(client: GithubClient) -> Self {
        Self { client }
    }

    pub async fn latest_commit(&self, repo: &str) -> GithubResult<CommitSummary> {
        // Existence check first so a bad URL surfaces as NotFound rather
        // than whatever the commits endpoint reports.
        let repository = self.client.get_repository(repo).await?;
        info!(
            repo = %repository.full_name,
            branch = %repository.default_branch,
            "repository resolved"
        );
        self.client.latest_commit(repo).await
    }

    /// Fetches the commit's changed files with their content at the commit
    /// and at its first parent. Individual content fetches degrade to
    /// placeholders; only commit-level failures abort.
    pub async fn commit_changes(&self, repo: &str, sha: &str) -> GithubResult<Vec<ChangedFile>> {
        let commit = self.client.get_commit(repo, sha).await?;
        let parent = commit
            .parents
            .first()
            .cloned()
            .ok_or_else(|| GithubError::RootCommit(commit.sha.clone()))?;

        info!(
            repo,
            sha = %commit.sha,
            files = commit.files.len(),
            "comparing commit against parent"
        );

        let mut changed = Vec::with_capacity(commit.files.len());
        for file in commit.files {
            let mut after = String::new();
            let mut before = String::new();

            if file.status != FileStatus::Removed {
                after = match self
                    .client
                    .get_file_content(repo, &file.filename, &commit.sha)
                    .await
                {
                    Ok(Some(text)) => text,
                    Ok(None) => fetch_placeholder(&file.filename),
                    Err(err) => {
                        warn!(file = %file.filename, "content fetch at commit failed: {err}");
                        fetch_placeholder(&file.filename)
                    }
                };
            }

            if file.status != FileStatus::Added {
                before = match self
                    .client
                    .get_file_content(repo, &file.filename, &parent)
                    .await
                {
                    Ok(Some(text)) => text,
                    Ok(None) => String::new(),
                    Err(err) => {
                        warn!(file = %file.filename, "content fetch at parent failed: {err}");
                        String::new()
                    }
                };
            }

            changed.push(ChangedFile {
                filename: file.filename,
                status: file.status,
                before,
                after,
            });
        }

        Ok(changed)
    }
}

fn fetch_placeholder(filename: &str) -> String {
    format!("Failed to fetch content of {filename}.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn differ(base: String) -> CommitDiffer {
        CommitDiffer::new(GithubClient::new("t".to_string(), Some(base)).unwrap())
    }

    #[tokio::test]
    async fn added_files_have_empty_before_and_removed_files_empty_after() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/repos/octo/demo/commits/abc")
            .with_status(200)
            .with_body(
                r#"{"sha":"abc","parents":[{"sha":"par"}],"files":[{"filename":"new.rs","status":"added"},{"filename":"old.rs","status":"removed"},{"filename":"lib.rs","status":"modified"}]}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/repos/octo/demo/contents/new.rs?ref=abc")
            .with_status(200)
            .with_body("fn new() {}")
            .create_async()
            .await;
        server
            .mock("GET", "/repos/octo/demo/contents/old.rs?ref=par")
            .with_status(200)
            .with_body("fn old() {}")
            .create_async()
            .await;
        server
            .mock("GET", "/repos/octo/demo/contents/lib.rs?ref=abc")
            .with_status(200)
            .with_body("fn lib() { 2 }")
            .create_async()
            .await;
        server
            .mock("GET", "/repos/octo/demo/contents/lib.rs?ref=par")
            .with_status(200)
            .with_body("fn lib() { 1 }")
            .create_async()
            .await;

        let changes = differ(server.url())
            .commit_changes("octo/demo", "abc")
            .await
            .unwrap();
        assert_eq!(changes.len(), 3);

        let added = &changes[0];
        assert_eq!(added.status, FileStatus::Added);
        assert_eq!(added.before, "");
        assert_eq!(added.after, "fn new() {}");

        let removed = &changes[1];
        assert_eq!(removed.status, FileStatus::Removed);
        assert_eq!(removed.before, "fn old() {}");
        assert_eq!(removed.after, "");

        let modified = &changes[2];
        assert_eq!(modified.before, "fn lib() { 1 }");
        assert_eq!(modified.after, "fn lib() { 2 }");
    }

    #[tokio::test]
    async fn root_commit_cannot_be_compared() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/repos/octo/demo/commits/root")
            .with_status(200)
            .with_body(r#"{"sha":"root","parents":[],"files":[{"filename":"a.rs","status":"added"}]}"#)
            .create_async()
            .await;

        let err = differ(server.url())
            .commit_changes("octo/demo", "root")
            .await
            .unwrap_err();
        assert!(matches!(err, GithubError::RootCommit(sha) if sha == "root"));
    }

    #[tokio::test]
    async fn content_fetch_failures_degrade_per_file() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/repos/octo/demo/commits/abc")
            .with_status(200)
            .with_body(
                r#"{"sha":"abc","parents":[{"sha":"par"}],"files":[{"filename":"lib.rs","status":"modified"}]}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/repos/octo/demo/contents/lib.rs?ref=abc")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;
        server
            .mock("GET", "/repos/octo/demo/contents/lib.rs?ref=par")
            .with_status(404)
            .create_async()
            .await;

        let changes = differ(server.url())
            .commit_changes("octo/demo", "abc")
            .await
            .unwrap();
        assert_eq!(changes[0].after, "Failed to fetch content of lib.rs.");
        assert_eq!(changes[0].before, "");
    }

    #[tokio::test]
    async fn unknown_repository_is_distinct_from_other_failures() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/repos/octo/gone")
            .with_status(404)
            .create_async()
            .await;

        let err = differ(server.url())
            .latest_commit("octo/gone")
            .await
            .unwrap_err();
        assert!(matches!(err, GithubError::NotFound));
    }
}
