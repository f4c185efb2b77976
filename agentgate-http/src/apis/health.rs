use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::ServerState;

pub const SERVICE_NAME: &str = "agentgate";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub active_sessions: usize,
}

/// GET /health
pub async fn handle_health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        active_sessions: state.registry.len().await,
    })
}
