use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Last push recorded by the webhook listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestCommit {
    pub repository: String,
    pub commit_sha: String,
}

/// Single-line scratch file shared between the webhook listener (writer)
/// and the interactive interface (reader). Format: `<repo_full_name>,<sha>`,
/// overwritten on every push. Written without locking; the webhook is the
/// only expected writer.
pub struct CommitPointerStore {
    path: PathBuf,
}

impl CommitPointerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn record(&self, repository: &str, commit_sha: &str) -> Result<()> {
        std::fs::write(&self.path, format!("{repository},{commit_sha}"))
            .with_context(|| format!("failed to write commit pointer {}", self.path.display()))
    }

    /// `Ok(None)` when nothing has been recorded yet; `Err` when the file
    /// exists but does not hold a `repo,sha` line.
    pub fn load(&self) -> Result<Option<LatestCommit>> {
        let line = match std::fs::read_to_string(&self.path) {
            Ok(line) => line,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read commit pointer {}", self.path.display())
                })
            }
        };

        let line = line.trim();
        let (repository, commit_sha) = line.split_once(',').with_context(|| {
            format!("malformed commit pointer {}: {line:?}", self.path.display())
        })?;
        Ok(Some(LatestCommit {
            repository: repository.to_string(),
            commit_sha: commit_sha.to_string(),
        }))
    }
}
