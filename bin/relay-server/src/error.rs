//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON `{ "error": ... }` body with an appropriate status code.
//!
//! Store and model failures surface the upstream message to the caller;
//! unclassified internal errors are logged in full but answered with a
//! generic message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::services::model::ModelError;

/// All errors that can occur in the relay-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the turn store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Propagated from the generative model client.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or incomplete request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Database(_) | ServerError::Model(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let client_message = match &self {
            ServerError::NotFound(m) | ServerError::BadRequest(m) => m.clone(),
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                e.to_string()
            }
            ServerError::Model(e) => {
                error!(error = %e, "model error");
                e.to_string()
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                "internal server error".to_owned()
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}
