use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use nexus_agent::{Assistant, AssistantReply};
use nexus_core::errors::InterfaceError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub detail: String,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
    pub cache_entries: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/messages", post(post_message))
        .route("/v1/memory/clear", post(clear_memory))
        .with_state(state)
}

pub async fn post_message(
    State(state): State<AppState>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<AssistantReply>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();
    info!(
        event_name = "http.message.received",
        correlation_id = %correlation_id,
        message_len = body.message.len(),
        "message received"
    );

    match state.assistant.handle_message(&body.message).await {
        Ok(reply) => Ok(Json(reply)),
        Err(error) => {
            let error = error.into_interface(correlation_id);
            warn!(
                event_name = "http.message.rejected",
                correlation_id = %error.correlation_id(),
                error = %error,
                "message could not be handled"
            );
            Err(error_response(error))
        }
    }
}

pub async fn clear_memory(State(state): State<AppState>) -> Json<ClearResponse> {
    state.assistant.reset().await;
    info!(event_name = "http.memory.cleared", correlation_id = "api", "memory and cache cleared");

    Json(ClearResponse {
        cleared: true,
        cache_entries: state.assistant.manager().cache_stats().entries,
    })
}

fn error_response(error: InterfaceError) -> (StatusCode, Json<ApiError>) {
    let status = match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ApiError {
        error: error.user_message().to_string(),
        detail: error.to_string(),
        correlation_id: error.correlation_id().to_string(),
    };
    (status, Json(body))
}
