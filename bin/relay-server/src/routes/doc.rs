use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::routes::{chat, health, history};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(info(
    title = "relay-server",
    description = "Streaming chat relay with persisted conversation history",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root.merge(history::HistoryApi::openapi());
    root
}

/// Serve the OpenAPI document as JSON.
pub fn router() -> Router<Arc<AppState>> {
    let docs = get_docs();
    Router::new().route(
        "/api-docs/openapi.json",
        get(move || {
            let docs = docs.clone();
            async move { Json(docs) }
        }),
    )
}
