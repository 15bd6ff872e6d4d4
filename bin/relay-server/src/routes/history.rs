//! History browsing routes.
//!
//! `GET /history/{sessionId}` groups a session's turns into conversations,
//! most recently updated first. `GET /history-detail/{conversationId}`
//! resolves a conversation id (its opening turn's id) to the full session.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::ErrorResponse;
use crate::schemas::history::{
    ConversationResponse, HistoryDetailResponse, HistoryResponse, TurnResponse,
};
use crate::services::detail::resolve_detail;
use crate::services::grouping::group_conversations;
use crate::services::history::load_session_turns;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_history, get_history_detail),
    components(schemas(
        HistoryResponse,
        HistoryDetailResponse,
        ConversationResponse,
        TurnResponse,
        ErrorResponse
    ))
)]
pub struct HistoryApi;

/// Register history routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/history", get(missing_session_id))
        .route("/history/", get(missing_session_id))
        .route("/history/{sessionId}", get(get_history))
        .route("/history-detail", get(missing_conversation_id))
        .route("/history-detail/", get(missing_conversation_id))
        .route("/history-detail/{conversationId}", get(get_history_detail))
}

async fn missing_session_id() -> ServerError {
    ServerError::BadRequest("sessionId is required".into())
}

/// An empty conversation id resolves to nothing.
async fn missing_conversation_id() -> ServerError {
    ServerError::NotFound("Conversation not found".into())
}

#[utoipa::path(
    get,
    path = "/history/{sessionId}",
    tag = "history",
    params(("sessionId" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Conversations, most recent first", body = HistoryResponse),
        (status = 400, description = "Missing sessionId", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, ServerError> {
    if session_id.trim().is_empty() {
        return Err(missing_session_id().await);
    }
    let turns = load_session_turns(state.store.as_ref(), &session_id).await?;
    let history = group_conversations(&turns)
        .iter()
        .map(|c| c.to_response())
        .collect();
    Ok(Json(HistoryResponse { history }))
}

#[utoipa::path(
    get,
    path = "/history-detail/{conversationId}",
    tag = "history",
    params(("conversationId" = String, Path, description = "Id of the conversation's opening turn")),
    responses(
        (status = 200, description = "Full session history", body = HistoryDetailResponse),
        (status = 404, description = "Unknown conversation", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn get_history_detail(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<HistoryDetailResponse>, ServerError> {
    let detail = resolve_detail(state.store.as_ref(), &conversation_id).await?;
    Ok(Json(detail.to_response()))
}
