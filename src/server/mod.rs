pub mod error;
pub mod routes;
pub mod session;
pub mod webhook;

use crate::core::{CommitDiffer, CommitPointerStore, ContentGenerator, DocumentExporter};
use anyhow::{Context, Result};
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use session::SessionStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub use error::{AppError, AppResult};

/// Everything the interface handlers need, shared behind an Arc.
pub struct AppState {
    pub generator: ContentGenerator,
    pub differ: CommitDiffer,
    pub exporter: DocumentExporter,
    pub sessions: SessionStore,
    pub pointer: CommitPointerStore,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/generate/text", post(routes::generate_text))
        .route("/api/generate/files", post(routes::generate_files))
        .route("/api/github/commit", post(routes::github_commit))
        .route("/api/github/generate", post(routes::github_generate))
        .route(
            "/api/document/{kind}",
            get(routes::get_document).put(routes::put_document),
        )
        .route("/api/document/{kind}/pdf", get(routes::document_pdf))
        .route("/api/webhook/latest", get(routes::webhook_latest))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind interface on {addr}"))?;
    info!("interface listening on http://{addr}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("interface server error")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../../assets/index.html"))
}
