use crate::core::pointer::CommitPointerStore;
use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct PushEvent {
    repository: RepositoryField,
    head_commit: Option<HeadCommitField>,
}

#[derive(Debug, Deserialize)]
struct RepositoryField {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct HeadCommitField {
    id: String,
    message: String,
}

pub fn webhook_router(store: Arc<CommitPointerStore>) -> Router {
    Router::new()
        .route("/github-webhook", post(handle_github_webhook))
        .with_state(store)
}

/// Always-on listener process. Shares nothing with the interactive server
/// except the scratch file behind the pointer store.
pub async fn serve(addr: SocketAddr, store: Arc<CommitPointerStore>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind webhook listener on {addr}"))?;
    info!("webhook listener on http://{addr}/github-webhook");
    axum::serve(listener, webhook_router(store))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook listener error")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn handle_github_webhook(
    State(store): State<Arc<CommitPointerStore>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let event_type = headers
        .get("x-github-event")
        .and_then(|value| value.to_str().ok());
    if event_type != Some("push") {
        info!(event = event_type.unwrap_or("<missing>"), "ignoring event");
        return (StatusCode::ACCEPTED, "ignored").into_response();
    }

    // Push payloads missing the expected fields are rejected outright
    // rather than faulting the handler.
    let event: PushEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "MALFORMED_PAYLOAD",
                    "message": err.to_string(),
                })),
            )
                .into_response();
        }
    };

    let Some(head) = event.head_commit else {
        // e.g. a branch deletion: a push with nothing to record
        info!(repository = %event.repository.full_name, "push without head commit");
        return (StatusCode::OK, "received").into_response();
    };

    info!(
        repository = %event.repository.full_name,
        commit = %head.id,
        message = %head.message.lines().next().unwrap_or(""),
        "recording pushed commit"
    );
    if let Err(err) = store.record(&event.repository.full_name, &head.id) {
        error!("failed to record commit pointer: {err:#}");
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to record").into_response();
    }

    (StatusCode::OK, "received").into_response()
}
