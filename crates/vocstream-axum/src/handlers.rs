//! Axum handlers for the `/api/*` endpoints.
//!
//! Handlers are thin wrappers — each calls into the speech controllers
//! or the chat worker and returns JSON. Request shapes are co-located
//! here to keep the handler surface self-contained.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::chat_worker;
use crate::error::HttpError;
use crate::state::AppState;

// ── Request/response shapes ────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// `"running"` while the chat worker or any stage is active.
    pub state: String,

    /// Partial text accumulated for the current response.
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub status: String,
}

// ── Handlers ───────────────────────────────────────────────────────

/// `POST /api/chat` — stream a model response into speech.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<AckResponse>, HttpError> {
    let prompt = req.text.trim().to_string();
    if prompt.is_empty() {
        return Err(HttpError::BadRequest("text must not be empty".into()));
    }

    chat_worker::start_chat(&state, prompt);
    Ok(Json(AckResponse {
        status: "running".into(),
    }))
}

/// `POST /api/speak` — speak a literal text.
pub async fn speak(
    State(state): State<AppState>,
    Json(req): Json<SpeakRequest>,
) -> Result<Json<AckResponse>, HttpError> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(HttpError::BadRequest("text must not be empty".into()));
    }

    // enqueue blocks under backpressure — keep it off the executor.
    let queue = Arc::clone(&state.queue);
    tokio::task::spawn_blocking(move || queue.enqueue(&text))
        .await
        .map_err(|e| HttpError::Internal(e.to_string()))??;

    Ok(Json(AckResponse {
        status: "queued".into(),
    }))
}

/// `POST /api/stop` — cancel the chat worker and the current speech.
pub async fn stop(State(state): State<AppState>) -> Json<AckResponse> {
    state.cancel_chat();
    state.queue.stop();
    Json(AckResponse {
        status: "stopped".into(),
    })
}

/// `GET /api/status` — `{state: running|idle, text: <partial text>}`.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let running = state.chat_active() || !state.queue.is_idle();
    Json(StatusResponse {
        state: if running { "running" } else { "idle" }.into(),
        text: state.latest_text(),
    })
}
