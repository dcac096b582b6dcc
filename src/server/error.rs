use crate::adapters::github::GithubError;
use crate::core::generator::DocumentKind;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Interface-layer error. Every variant maps to an inline JSON message so
/// failures surface to the user instead of crashing the process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("no commit has been recorded by the webhook yet")]
    NoCommitRecorded,

    #[error("the {0} slot is empty; generate something first")]
    EmptyDocument(DocumentKind),

    #[error(transparent)]
    Github(#[from] GithubError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NoCommitRecorded | AppError::EmptyDocument(_) => StatusCode::NOT_FOUND,
            AppError::Github(GithubError::NotFound) | AppError::Github(GithubError::NoCommits) => {
                StatusCode::NOT_FOUND
            }
            AppError::Github(GithubError::RootCommit(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Github(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NoCommitRecorded => "NO_COMMIT_RECORDED",
            AppError::EmptyDocument(_) => "EMPTY_DOCUMENT",
            AppError::Github(GithubError::NotFound) => "REPO_NOT_FOUND",
            AppError::Github(GithubError::NoCommits) => "NO_COMMITS",
            AppError::Github(GithubError::RootCommit(_)) => "ROOT_COMMIT",
            AppError::Github(_) => "GITHUB_ERROR",
            AppError::Internal(_) => "INTERNAL",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // anyhow's alternate formatting keeps the context chain visible
        let message = match &self {
            AppError::Internal(err) => format!("{err:#}"),
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: self.error_code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
