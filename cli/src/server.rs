//! HTTP chat API.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use resumebot_chat::{ChatHandler, ChatRequest, ChatResponse, HandlerError};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, warn};

/// Error payload; `detail` carries the handler's message.
#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

/// Routes for the chat API over a shared handler.
pub fn router(handler: Arc<ChatHandler>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat", post(chat))
        .with_state(handler)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn chat(
    State(handler): State<Arc<ChatHandler>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorBody>)> {
    handler.answer(request).await.map(Json).map_err(error_response)
}

fn error_response(err: HandlerError) -> (StatusCode, Json<ErrorBody>) {
    let status = match err {
        HandlerError::EmptyMessage => StatusCode::BAD_REQUEST,
        HandlerError::Retrieval(_) | HandlerError::Generation(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        error!("Chat request failed: {err}");
    } else {
        warn!("Rejected chat request: {err}");
    }
    (
        status,
        Json(ErrorBody {
            detail: err.to_string(),
        }),
    )
}
