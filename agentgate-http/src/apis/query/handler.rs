use agentgate_core::{one_shot, AgentOptions};
use axum::{
    extract::State,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, info};
use uuid::Uuid;

use super::types::{QueryRequest, QueryResponse};
use crate::streaming::{collect_messages, sse_response};
use crate::{ApiJson, ErrorResponse, ServerState};

/// POST /query - stateless prompt on a throwaway client
pub async fn handle_query(
    State(state): State<ServerState>,
    ApiJson(payload): ApiJson<QueryRequest>,
) -> Result<Response, ErrorResponse> {
    let request_id = Uuid::new_v4();
    info!("[{}] POST /query stream={}", request_id, payload.stream);

    let options = AgentOptions::from_json(payload.options).map_err(|e| {
        error!("[{}] Rejected client options: {}", request_id, e);
        ErrorResponse::from(e)
    })?;

    let client = state.factory.create(options);
    let messages = one_shot(client, payload.prompt);

    if payload.stream {
        return Ok(sse_response(messages, state.frame_format, request_id.to_string()));
    }

    let messages = collect_messages(messages).await.map_err(|e| {
        error!("[{}] Query failed: {}", request_id, e);
        ErrorResponse::from(e)
    })?;

    Ok(Json(QueryResponse {
        status: "success".to_string(),
        messages,
    })
    .into_response())
}
