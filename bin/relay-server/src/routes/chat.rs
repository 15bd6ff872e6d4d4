//! Streaming chat route.
//!
//! `POST /stream-chat` persists the user message, relays it to the model
//! with the session's history as context, and streams the reply back as
//! chunked `text/plain`. Failures before the first byte is sent map to a
//! JSON error; once streaming has begun the body can only end early.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use futures::StreamExt;
use tracing::{Instrument, debug};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::ErrorResponse;
use crate::schemas::chat::StreamChatRequest;
use crate::services::relay::{self, RelayRequest};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(stream_chat),
    components(schemas(StreamChatRequest, ErrorResponse))
)]
pub struct ChatApi;

/// Register chat routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/stream-chat", post(stream_chat))
}

/// Relay one chat exchange (`POST /stream-chat`).
#[utoipa::path(
    post,
    path = "/stream-chat",
    tag = "chat",
    request_body = StreamChatRequest,
    responses(
        (status = 200, description = "Model reply, streamed as it is generated", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing message or sessionId", body = ErrorResponse),
        (status = 500, description = "Store or model failure before streaming began", body = ErrorResponse),
    )
)]
pub async fn stream_chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StreamChatRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let request = RelayRequest::new(req.session_id, req.message)?;
    debug!(session_id = %request.session_id, message_len = request.message.len(), "stream-chat request");

    let relay = relay::open_stream(
        state.store.clone(),
        state.model.as_ref(),
        &state.relay_settings(),
        request,
    )
    .await?;

    // The response only carries fragments; the outcome is logged once the relay ends.
    tokio::spawn(relay::report(relay.completion).in_current_span());

    let body = Body::from_stream(
        relay
            .fragments
            .map(|fragment| Ok::<_, Infallible>(Bytes::from(fragment))),
    );
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}
