use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::entities::SqlStore;
use crate::entities::dao::{NewTurn, Role, Turn};

type TurnRow = (String, String, String, String, String);

pub trait TurnStore: Send + Sync + 'static {
    /// Append one turn; the store assigns its id.
    fn insert_turn(&self, turn: NewTurn) -> impl Future<Output = Result<Turn, sqlx::Error>> + Send;

    /// All turns of a session, oldest first. Equal timestamps keep insertion order.
    fn list_turns(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Vec<Turn>, sqlx::Error>> + Send;

    fn get_turn(&self, id: &str) -> impl Future<Output = Result<Option<Turn>, sqlx::Error>> + Send;
}

impl TurnStore for SqlStore {
    async fn insert_turn(&self, turn: NewTurn) -> Result<Turn, sqlx::Error> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO turns (id, session_id, role, content, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(&turn.session_id)
        .bind(turn.role.to_string())
        .bind(&turn.content)
        .bind(encode_timestamp(&turn.created_at))
        .execute(&self.pool)
        .await?;
        Ok(Turn {
            id,
            session_id: turn.session_id,
            role: turn.role,
            content: turn.content,
            created_at: turn.created_at,
        })
    }

    async fn list_turns(&self, session_id: &str) -> Result<Vec<Turn>, sqlx::Error> {
        let rows: Vec<TurnRow> = sqlx::query_as(
            "SELECT id, session_id, role, content, created_at \
             FROM turns WHERE session_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().filter_map(turn_from_row).collect())
    }

    async fn get_turn(&self, id: &str) -> Result<Option<Turn>, sqlx::Error> {
        let row: Option<TurnRow> = sqlx::query_as(
            "SELECT id, session_id, role, content, created_at FROM turns WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.and_then(turn_from_row))
    }
}

/// Fixed-width UTC form, so text order in SQL matches time order.
fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn turn_from_row((id, session_id, role, content, created_at): TurnRow) -> Option<Turn> {
    let role = match Role::from_str(&role) {
        Ok(role) => role,
        Err(_) => {
            tracing::warn!(turn_id = %id, raw = %role, "skipping turn with unknown role");
            return None;
        }
    };
    let created_at = created_at.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %created_at, error = %e, "failed to parse turn created_at; using now");
        Utc::now()
    });
    Some(Turn {
        id,
        session_id,
        role,
        content,
        created_at,
    })
}
