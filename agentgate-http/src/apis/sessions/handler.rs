use agentgate_core::AgentOptions;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
};
use tracing::{error, info};
use uuid::Uuid;

use super::types::*;
use crate::session::SessionError;
use crate::streaming::{collect_messages, sse_response};
use crate::{ApiJson, ErrorResponse, ServerState};

/// POST /sessions - open a client and keep it for later queries
pub async fn handle_create_session(
    State(state): State<ServerState>,
    ApiJson(payload): ApiJson<SessionCreateRequest>,
) -> Result<Json<SessionResponse>, ErrorResponse> {
    let request_id = Uuid::new_v4().to_string();
    info!("[{}] POST /sessions", request_id);

    let options = AgentOptions::from_json(payload.options).map_err(SessionError::ClientInit)?;
    let session_id = state.registry.create(&request_id, options).await?;

    Ok(Json(SessionResponse {
        session_id,
        message: "Session created successfully".to_string(),
    }))
}

/// GET /sessions
pub async fn handle_list_sessions(State(state): State<ServerState>) -> Json<SessionList> {
    let sessions = state.registry.list().await;
    Json(SessionList {
        count: sessions.len(),
        sessions,
    })
}

/// GET /sessions/{session_id}
pub async fn handle_get_session(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionInfo>, ErrorResponse> {
    state
        .registry
        .get(&session_id)
        .await
        .ok_or(SessionError::NotFound)?;

    Ok(Json(SessionInfo {
        session_id,
        status: "active".to_string(),
    }))
}

/// POST /sessions/{session_id}/query - continue the session's conversation
pub async fn handle_session_query(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
    ApiJson(payload): ApiJson<SessionQueryRequest>,
) -> Result<Response, ErrorResponse> {
    let request_id = Uuid::new_v4().to_string();
    info!(
        "[{}] POST /sessions/{}/query stream={}",
        request_id, session_id, payload.stream
    );

    let session = state
        .registry
        .get(&session_id)
        .await
        .ok_or(SessionError::NotFound)?;

    let mut lease = session.lease(&request_id).await?;
    lease.submit(&payload.prompt).await.map_err(|e| {
        error!("[{}] - [{}] Failed to send prompt: {}", request_id, session_id, e);
        ErrorResponse::from(e)
    })?;

    let label = format!("{}/{}", request_id, session_id);
    if payload.stream {
        return Ok(sse_response(lease.into_turn(), state.frame_format, label));
    }

    let messages = collect_messages(lease.into_turn()).await.map_err(|e| {
        error!("[{}] - [{}] Query failed: {}", request_id, session_id, e);
        ErrorResponse::from(e)
    })?;

    Ok(Json(SessionQueryResponse {
        status: "success".to_string(),
        session_id,
        messages,
    })
    .into_response())
}

/// DELETE /sessions/{session_id}
pub async fn handle_delete_session(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
) -> Result<Json<DeleteResponse>, ErrorResponse> {
    info!("DELETE /sessions/{}", session_id);

    if !state.registry.close(&session_id).await {
        return Err(SessionError::NotFound.into());
    }

    Ok(Json(DeleteResponse {
        status: "success".to_string(),
        message: format!("Session {} deleted successfully", session_id),
    }))
}
