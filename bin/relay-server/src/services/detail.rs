//! Conversation detail lookup.
//!
//! The external "conversation id" is the id of the opening user turn. The
//! detail view returns the whole session the turn belongs to, flat and in
//! chronological order, not just that conversation's slice.

use tracing::debug;

use crate::entities::{Turn, TurnStore};
use crate::error::ServerError;
use crate::services::history::load_session_turns;

#[derive(Debug, Clone)]
pub struct ConversationDetail {
    /// Full content of the looked-up turn.
    pub title: String,
    pub messages: Vec<Turn>,
}

pub async fn resolve_detail<S: TurnStore>(
    store: &S,
    conversation_id: &str,
) -> Result<ConversationDetail, ServerError> {
    let anchor = store
        .get_turn(conversation_id)
        .await?
        .ok_or_else(|| ServerError::NotFound("Conversation not found".into()))?;

    let messages = load_session_turns(store, &anchor.session_id).await?;
    debug!(conversation_id, session_id = %anchor.session_id, messages = messages.len(), "resolved conversation detail");

    Ok(ConversationDetail {
        title: anchor.content,
        messages,
    })
}
