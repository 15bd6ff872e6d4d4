use chrono::{DateTime, Utc};
use strum::{Display, EnumString};

/// Author of a turn, stored as `"user"` / `"model"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// A single row in the `turns` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Fields of a turn before the store has assigned an id.
#[derive(Debug, Clone)]
pub struct NewTurn {
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
