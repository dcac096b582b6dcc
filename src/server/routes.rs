use crate::core::commit_diff::FileStatus;
use crate::core::generator::{CodeBlob, CodeInput, DocumentKind};
use crate::core::pointer::LatestCommit;
use crate::server::error::{AppError, AppResult};
use crate::server::session::CommitContext;
use crate::server::AppState;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Sessions are keyed by a client-chosen identifier; requests without one
/// all share the anonymous session.
fn session_id(headers: &HeaderMap) -> String {
    headers
        .get("x-session-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

#[derive(Debug, Deserialize)]
pub struct TextGenerateRequest {
    pub summary: String,
    #[serde(default)]
    pub before: Option<String>,
    pub after: String,
    pub kind: DocumentKind,
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub kind: DocumentKind,
    pub markdown: String,
}

pub async fn generate_text(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<TextGenerateRequest>,
) -> AppResult<Json<DocumentResponse>> {
    let session = session_id(&headers);
    validate_summary(&request.summary)?;
    if request.after.trim().is_empty() {
        return Err(AppError::BadRequest(
            "the AFTER code is required".to_string(),
        ));
    }

    let markdown = state
        .generator
        .generate(
            request.kind,
            request.summary.trim(),
            CodeInput::Text {
                before: request.before,
                after: request.after,
            },
        )
        .await?;
    state
        .sessions
        .set_document(&session, request.kind, markdown.clone())
        .await;
    Ok(Json(DocumentResponse {
        kind: request.kind,
        markdown,
    }))
}

pub async fn generate_files(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Json<DocumentResponse>> {
    let session = session_id(&headers);

    let mut summary = String::new();
    let mut kind: Option<DocumentKind> = None;
    let mut before: Option<CodeBlob> = None;
    let mut after: Option<CodeBlob> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(err.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("summary") => {
                summary = field
                    .text()
                    .await
                    .map_err(|err| AppError::BadRequest(err.to_string()))?;
            }
            Some("kind") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::BadRequest(err.to_string()))?;
                kind = Some(
                    value
                        .parse()
                        .map_err(|err: anyhow::Error| AppError::BadRequest(err.to_string()))?,
                );
            }
            Some(slot @ ("before" | "after")) => {
                let slot = slot.to_string();
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::BadRequest(err.to_string()))?
                    .to_vec();
                // A file input submitted empty means "no file picked".
                if bytes.is_empty() {
                    continue;
                }
                let blob = CodeBlob { filename, bytes };
                if slot == "before" {
                    before = Some(blob);
                } else {
                    after = Some(blob);
                }
            }
            _ => {}
        }
    }

    validate_summary(&summary)?;
    let kind = kind.ok_or_else(|| AppError::BadRequest("a document kind is required".to_string()))?;
    let after =
        after.ok_or_else(|| AppError::BadRequest("an AFTER file is required".to_string()))?;

    let markdown = state
        .generator
        .generate(kind, summary.trim(), CodeInput::Files { before, after })
        .await?;
    state
        .sessions
        .set_document(&session, kind, markdown.clone())
        .await;
    Ok(Json(DocumentResponse { kind, markdown }))
}

#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    pub repo_url: String,
}

#[derive(Debug, Serialize)]
pub struct CommitFileEntry {
    pub filename: String,
    pub status: FileStatus,
}

#[derive(Debug, Serialize)]
pub struct CommitResponse {
    pub repository: String,
    pub commit_sha: String,
    pub message: String,
    pub author: Option<String>,
    pub date: Option<chrono::DateTime<chrono::Utc>>,
    pub files: Vec<CommitFileEntry>,
}

pub async fn github_commit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CommitRequest>,
) -> AppResult<Json<CommitResponse>> {
    let session = session_id(&headers);
    let repo = parse_repo_url(&request.repo_url).ok_or_else(|| {
        AppError::BadRequest(format!(
            "could not extract owner/name from '{}'",
            request.repo_url
        ))
    })?;

    info!(%repo, "resolving latest commit");
    let latest = state.differ.latest_commit(&repo).await?;
    let files = state.differ.commit_changes(&repo, &latest.sha).await?;

    let entries = files
        .iter()
        .map(|file| CommitFileEntry {
            filename: file.filename.clone(),
            status: file.status,
        })
        .collect();
    state
        .sessions
        .set_commit_context(
            &session,
            CommitContext {
                repository: repo.clone(),
                commit_sha: latest.sha.clone(),
                files,
            },
        )
        .await;

    Ok(Json(CommitResponse {
        repository: repo,
        commit_sha: latest.sha,
        message: latest.message.lines().next().unwrap_or("").to_string(),
        author: latest.author,
        date: latest.date,
        files: entries,
    }))
}

#[derive(Debug, Deserialize)]
pub struct GithubGenerateRequest {
    pub summary: String,
    pub filename: String,
    pub kind: DocumentKind,
}

pub async fn github_generate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<GithubGenerateRequest>,
) -> AppResult<Json<DocumentResponse>> {
    let session = session_id(&headers);
    validate_summary(&request.summary)?;

    let context = state
        .sessions
        .commit_context(&session)
        .await
        .ok_or_else(|| AppError::BadRequest("fetch a commit before generating".to_string()))?;
    let file = context
        .files
        .iter()
        .find(|file| file.filename == request.filename)
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "'{}' is not part of commit {}",
                request.filename, context.commit_sha
            ))
        })?;
    if file.after.trim().is_empty() {
        return Err(AppError::BadRequest(format!(
            "'{}' was removed in this commit; there is no AFTER content to analyze",
            request.filename
        )));
    }

    let before = (!file.before.is_empty()).then(|| file.before.clone());
    let markdown = state
        .generator
        .generate(
            request.kind,
            request.summary.trim(),
            CodeInput::Text {
                before,
                after: file.after.clone(),
            },
        )
        .await?;
    state
        .sessions
        .set_document(&session, request.kind, markdown.clone())
        .await;
    Ok(Json(DocumentResponse {
        kind: request.kind,
        markdown,
    }))
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(kind): Path<DocumentKind>,
) -> AppResult<Json<DocumentResponse>> {
    let session = session_id(&headers);
    let markdown = state.sessions.document(&session, kind).await;
    Ok(Json(DocumentResponse { kind, markdown }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub markdown: String,
}

pub async fn put_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(kind): Path<DocumentKind>,
    Json(request): Json<UpdateDocumentRequest>,
) -> AppResult<StatusCode> {
    let session = session_id(&headers);
    state
        .sessions
        .set_document(&session, kind, request.markdown)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn document_pdf(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(kind): Path<DocumentKind>,
) -> AppResult<impl IntoResponse> {
    let session = session_id(&headers);
    let markdown = state.sessions.document(&session, kind).await;
    if markdown.trim().is_empty() {
        return Err(AppError::EmptyDocument(kind));
    }

    let bytes = state.exporter.to_pdf(&markdown).await?;
    let disposition = format!("attachment; filename=\"{}\"", kind.download_name());
    Ok((
        [
            ("content-type", "application/pdf".to_string()),
            ("content-disposition", disposition),
        ],
        bytes,
    ))
}

pub async fn webhook_latest(State(state): State<Arc<AppState>>) -> AppResult<Json<LatestCommit>> {
    match state.pointer.load()? {
        Some(pointer) => Ok(Json(pointer)),
        None => Err(AppError::NoCommitRecorded),
    }
}

fn validate_summary(summary: &str) -> AppResult<()> {
    if summary.trim().is_empty() {
        return Err(AppError::BadRequest(
            "a developer summary is required".to_string(),
        ));
    }
    Ok(())
}

// Last two path segments of the repository URL, with any trailing `.git`
// or slash stripped.
static REPO_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^/\s:]+)/([^/\s:]+?)(?:\.git)?/?$").unwrap());

pub fn parse_repo_url(url: &str) -> Option<String> {
    let caps = REPO_URL.captures(url.trim())?;
    Some(format!("{}/{}", &caps[1], &caps[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_url_takes_last_two_segments() {
        assert_eq!(
            parse_repo_url("https://github.com/octo/demo").as_deref(),
            Some("octo/demo")
        );
        assert_eq!(
            parse_repo_url("https://github.com/octo/demo/").as_deref(),
            Some("octo/demo")
        );
        assert_eq!(
            parse_repo_url("git@host:octo/demo.git")
                .as_deref(),
            Some("octo/demo")
        );
        assert_eq!(parse_repo_url("octo/demo").as_deref(), Some("octo/demo"));
    }

    #[test]
    fn repo_url_without_two_segments_is_rejected() {
        assert_eq!(parse_repo_url("https://github.com"), None);
        assert_eq!(parse_repo_url("demo"), None);
        assert_eq!(parse_repo_url(""), None);
    }
}
