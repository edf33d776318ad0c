use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use nexus_agent::runtime::SessionState;
use serde::Serialize;

use crate::routes::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentHealth {
    pub session: SessionState,
    pub tool_sessions: usize,
    pub tools_offered: usize,
    pub cache_entries: usize,
    pub cache_capacity: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub agent: AgentHealth,
    pub checked_at: String,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// An uninitialized session is healthy: it is opened on the first cache miss.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let status = state.assistant.manager().status();

    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "nexus-server runtime initialized".to_string(),
        },
        agent: AgentHealth {
            session: status.session,
            tool_sessions: status.tool_sessions.len(),
            tools_offered: status.tool_sessions.iter().map(|session| session.tools).sum(),
            cache_entries: status.cache_entries,
            cache_capacity: status.cache_capacity,
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
