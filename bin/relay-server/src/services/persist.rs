//! Turn persistence: one insert per call, timestamped here rather than by
//! the caller.

use chrono::Utc;
use tracing::debug;

use crate::entities::{NewTurn, Role, Turn, TurnStore};
use crate::error::ServerError;

pub async fn persist_turn<S: TurnStore>(
    store: &S,
    session_id: &str,
    role: Role,
    content: String,
) -> Result<Turn, ServerError> {
    let turn = store
        .insert_turn(NewTurn {
            session_id: session_id.to_owned(),
            role,
            content,
            created_at: Utc::now(),
        })
        .await?;
    debug!(session_id, turn_id = %turn.id, %role, len = turn.content.len(), "turn persisted");
    Ok(turn)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::SqlStore;
    use crate::services::history::load_session_turns;

    #[tokio::test]
    async fn persisted_turn_reloads_with_same_role_and_content() {
        let store = SqlStore::connect("sqlite::memory:").await.unwrap();
        let before = Utc::now();
        let saved = persist_turn(&store, "s", Role::User, "Olá!".into()).await.unwrap();
        assert!(saved.created_at >= before);

        let turns = load_session_turns(&store, "s").await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "Olá!");
        assert_eq!(turns[0].id, saved.id);
    }

    #[tokio::test]
    async fn consecutive_writes_read_back_in_write_order() {
        let store = SqlStore::connect("sqlite::memory:").await.unwrap();
        persist_turn(&store, "s", Role::User, "question".into()).await.unwrap();
        persist_turn(&store, "s", Role::Model, "answer".into()).await.unwrap();
        let roles: Vec<_> = load_session_turns(&store, "s")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.role)
            .collect();
        assert_eq!(roles, [Role::User, Role::Model]);
    }
}
