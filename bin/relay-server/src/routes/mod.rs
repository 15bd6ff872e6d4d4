//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace span)
//! - Optional OpenAPI document (disable with `RELAY_ENABLE_DOCS=false`)
//! - Health route
//! - Chat streaming and history routes

mod chat;
pub mod doc;
mod health;
mod history;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .merge(chat::router())
        .merge(history::router());

    if state.config.enable_docs {
        app = app.merge(doc::router());
    }

    app.layer(cors::cors_layer(&state))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
