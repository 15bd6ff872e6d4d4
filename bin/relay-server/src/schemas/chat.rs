use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /stream-chat`.
///
/// Both fields are optional at the serde level so that a missing field is
/// reported as a 400 with the usual `{ "error": ... }` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamChatRequest {
    /// The new user message.
    #[serde(default)]
    pub message: Option<String>,
    /// Caller-chosen session identifier.
    #[serde(default)]
    pub session_id: Option<String>,
}
