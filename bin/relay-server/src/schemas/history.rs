use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::Turn;
use crate::services::detail::ConversationDetail;
use crate::services::grouping::Conversation;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub id: String,
    pub session_id: String,
    /// `"user"` or `"model"`.
    pub role: String,
    pub content: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    /// Id of the opening user turn; accepted by `/history-detail/{conversationId}`.
    pub id: String,
    pub title: String,
    pub updated_at: String,
    pub messages: Vec<TurnResponse>,
}

/// Response body for `GET /history/{sessionId}`, most recent first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    pub history: Vec<ConversationResponse>,
}

/// Response body for `GET /history-detail/{conversationId}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryDetailResponse {
    pub messages: Vec<TurnResponse>,
    pub title: String,
}

impl Turn {
    pub fn to_response(&self) -> TurnResponse {
        TurnResponse {
            id: self.id.clone(),
            session_id: self.session_id.clone(),
            role: self.role.to_string(),
            content: self.content.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

impl Conversation {
    pub fn to_response(&self) -> ConversationResponse {
        ConversationResponse {
            id: self.id.clone(),
            title: self.title.clone(),
            updated_at: self.updated_at.to_rfc3339(),
            messages: self.messages.iter().map(Turn::to_response).collect(),
        }
    }
}

impl ConversationDetail {
    pub fn to_response(&self) -> HistoryDetailResponse {
        HistoryDetailResponse {
            messages: self.messages.iter().map(Turn::to_response).collect(),
            title: self.title.clone(),
        }
    }
}
