//! HTTP endpoints for the gateway.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::chat;
use crate::error::GatewayError;
use crate::queue::QueueRouter;
use crate::reply::{EmailRequest, EmailResponse, ReplyAdapter};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub replies: ReplyAdapter,
    pub queue: QueueRouter,
}

/// Build the gateway router.
pub fn gateway_routes(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/reply", post(reply))
        .route("/chat/enqueue", post(enqueue_chat))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        model_loaded: state.replies.is_ready(),
    })
}

// ── Reply ───────────────────────────────────────────────────────────────

async fn reply(
    State(state): State<AppState>,
    body: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<EmailResponse>, GatewayError> {
    let Json(request) = body.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    let response = state.replies.reply(request).await?;
    Ok(Json(response))
}

// ── Chat queue ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct EnqueueResponse {
    enqueued: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    queue_id: Option<i64>,
}

async fn enqueue_chat(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<EnqueueResponse>, GatewayError> {
    let Json(payload) = body.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    if !payload.is_object() {
        return Err(GatewayError::InvalidRequest(
            "chat payload must be a JSON object".to_string(),
        ));
    }

    let message = chat::normalize(&payload);
    debug!(
        conversation_id = %message.conversation_id,
        channel = %message.channel,
        "Normalized chat message"
    );

    let result = state.queue.enqueue_one(message).await?;
    Ok(Json(EnqueueResponse {
        enqueued: result.enqueued_count,
        queue_id: result.backend_reference,
    }))
}
