//! Persistence layer.
//!
//! [`TurnStore`] defines the interface the services need from the document
//! store. The default implementation is [`SqlStore`], backed by SQLite. To
//! swap to another database, implement [`TurnStore`] for your new type and
//! change the concrete type in [`crate::state::AppState`].
//!
//! All trait methods use `impl Future` in their signatures so no extra
//! `async-trait` crate is required on this seam.

pub mod dao;
pub mod turn;

pub use dao::{NewTurn, Role, Turn};
pub use turn::TurnStore;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

#[derive(Clone, Debug)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://relay.db?mode=rwc"` or `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        // Every connection to an in-memory database sees its own empty file.
        let max_connections = if url.contains(":memory:") { 1 } else { 8 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[cfg(test)]
impl SqlStore {
    /// Number of turns across every session.
    pub async fn count_turns(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM turns")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// Close the pool so every later query fails.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
