use crate::core::commit_diff::ChangedFile;
use crate::core::generator::DocumentKind;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Commit fetched through the GitHub tab, kept so a follow-up generation
/// request can pick one of its files.
#[derive(Debug, Clone)]
pub struct CommitContext {
    pub repository: String,
    pub commit_sha: String,
    pub files: Vec<ChangedFile>,
}

#[derive(Debug, Clone, Default)]
struct SessionState {
    report: String,
    review: String,
    commit_context: Option<CommitContext>,
}

/// Per-session document slots, keyed by the caller-supplied session id.
/// Documents live only as long as the process.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn document(&self, session: &str, kind: DocumentKind) -> String {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session)
            .map(|state| match kind {
                DocumentKind::Report => state.report.clone(),
                DocumentKind::Review => state.review.clone(),
            })
            .unwrap_or_default()
    }

    pub async fn set_document(&self, session: &str, kind: DocumentKind, markdown: String) {
        let mut sessions = self.sessions.lock().await;
        let state = sessions.entry(session.to_string()).or_default();
        match kind {
            DocumentKind::Report => state.report = markdown,
            DocumentKind::Review => state.review = markdown,
        }
    }

    pub async fn commit_context(&self, session: &str) -> Option<CommitContext> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session)
            .and_then(|state| state.commit_context.clone())
    }

    pub async fn set_commit_context(&self, session: &str, context: CommitContext) {
        let mut sessions = self.sessions.lock().await;
        sessions.entry(session.to_string()).or_default().commit_context = Some(context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slots_are_independent_and_overwritten() {
        let store = SessionStore::new();
        store
            .set_document("s1", DocumentKind::Report, "v1".to_string())
            .await;
        store
            .set_document("s1", DocumentKind::Review, "r1".to_string())
            .await;
        store
            .set_document("s1", DocumentKind::Report, "v2".to_string())
            .await;

        assert_eq!(store.document("s1", DocumentKind::Report).await, "v2");
        assert_eq!(store.document("s1", DocumentKind::Review).await, "r1");
    }

    #[tokio::test]
    async fn sessions_do_not_share_documents() {
        let store = SessionStore::new();
        store
            .set_document("s1", DocumentKind::Report, "mine".to_string())
            .await;
        assert_eq!(store.document("s2", DocumentKind::Report).await, "");
    }
}
