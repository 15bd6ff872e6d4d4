//! Conversation grouping.
//!
//! A session's turns are split into conversations: each one opens at a user
//! turn and absorbs the model turns that follow it, up to the next user
//! turn. Conversations are derived on every request and never stored.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::entities::{Role, Turn};

/// Characters of the opening user turn kept as the conversation title.
pub const TITLE_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    /// Id of the opening user turn.
    pub id: String,
    pub title: String,
    /// Timestamp of the latest absorbed turn.
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Turn>,
}

impl Conversation {
    fn open(turn: &Turn) -> Self {
        Self {
            id: turn.id.clone(),
            title: title_of(&turn.content),
            updated_at: turn.created_at,
            messages: vec![turn.clone()],
        }
    }

    fn absorb(mut self, turn: &Turn) -> Self {
        self.updated_at = turn.created_at;
        self.messages.push(turn.clone());
        self
    }
}

pub fn title_of(content: &str) -> String {
    content.chars().take(TITLE_CHARS).collect()
}

/// Group chronologically ordered `turns` into conversations, most recently
/// updated first.
///
/// Model turns with no preceding user turn are dropped. Conversations with
/// equal `updated_at` keep their chronological order.
pub fn group_conversations(turns: &[Turn]) -> Vec<Conversation> {
    let (mut closed, open) = turns.iter().fold(
        (Vec::new(), None::<Conversation>),
        |(mut closed, open), turn| match (turn.role, open) {
            (Role::User, open) => {
                closed.extend(open);
                (closed, Some(Conversation::open(turn)))
            }
            (Role::Model, Some(current)) => (closed, Some(current.absorb(turn))),
            (Role::Model, None) => {
                warn!(turn_id = %turn.id, "dropping model turn with no preceding user turn");
                (closed, None)
            }
        },
    );
    closed.extend(open);
    closed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    closed
}
