//! History loading: a session's persisted turns, oldest first, and the
//! priming history built from them.

use tracing::debug;

use crate::entities::{Turn, TurnStore};
use crate::error::ServerError;
use crate::services::model::{PrimingEntry, PrimingRole};

/// Load every turn of `session_id` in ascending `created_at` order.
///
/// The store already orders its results; the stable re-sort keeps that
/// contract for stores whose ordering is weaker, leaving ties in store order.
pub async fn load_session_turns<S: TurnStore>(
    store: &S,
    session_id: &str,
) -> Result<Vec<Turn>, ServerError> {
    let mut turns = store.list_turns(session_id).await?;
    turns.sort_by_key(|t| t.created_at);
    Ok(turns)
}

/// Build the priming history for a new model session.
///
/// The fixed `priming_prompt` entry always comes first and is never
/// persisted; persisted turns follow in chronological order.
pub async fn load_priming_history<S: TurnStore>(
    store: &S,
    session_id: &str,
    priming_prompt: &str,
) -> Result<Vec<PrimingEntry>, ServerError> {
    let turns = load_session_turns(store, session_id).await?;
    debug!(session_id, prior_turns = turns.len(), "loaded priming history");
    Ok(priming_history(priming_prompt, turns))
}

fn priming_history(priming_prompt: &str, turns: Vec<Turn>) -> Vec<PrimingEntry> {
    std::iter::once(PrimingEntry {
        role: PrimingRole::System,
        text: priming_prompt.to_owned(),
    })
    .chain(turns.into_iter().map(|t| PrimingEntry {
        role: t.role.into(),
        text: t.content,
    }))
    .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{NewTurn, Role, SqlStore};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    async fn seeded(turns: &[(&str, Role, &str, i64)]) -> SqlStore {
        let store = SqlStore::connect("sqlite::memory:").await.unwrap();
        for (session, role, content, secs) in turns {
            store
                .insert_turn(NewTurn {
                    session_id: (*session).into(),
                    role: *role,
                    content: (*content).into(),
                    created_at: at(*secs),
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn empty_session_yields_only_priming_entry() {
        let store = seeded(&[]).await;
        let history = load_priming_history(&store, "s", "be brief").await.unwrap();
        assert_eq!(
            history,
            vec![PrimingEntry {
                role: PrimingRole::System,
                text: "be brief".into()
            }]
        );
    }

    #[tokio::test]
    async fn priming_entry_precedes_turns_in_time_order() {
        let store = seeded(&[
            ("s", Role::Model, "Hello", 2),
            ("s", Role::User, "Hi", 1),
            ("s", Role::User, "How are you?", 3),
            ("other", Role::User, "not mine", 0),
        ])
        .await;
        let history = load_priming_history(&store, "s", "be brief").await.unwrap();
        let flat: Vec<_> = history.iter().map(|e| (e.role, e.text.as_str())).collect();
        assert_eq!(
            flat,
            [
                (PrimingRole::System, "be brief"),
                (PrimingRole::User, "Hi"),
                (PrimingRole::Model, "Hello"),
                (PrimingRole::User, "How are you?"),
            ]
        );
    }

    #[tokio::test]
    async fn session_turns_are_non_decreasing_in_time() {
        let store = seeded(&[
            ("s", Role::User, "c", 9),
            ("s", Role::User, "a", 1),
            ("s", Role::Model, "b", 1),
            ("s", Role::Model, "d", 4),
        ])
        .await;
        let turns = load_session_turns(&store, "s").await.unwrap();
        assert!(turns.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        assert_eq!(turns.len(), 4);
    }
}
