//! One SQLite file holds both the chunk index and conversation turns.

mod turns;
mod vectors;

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};

use crate::error::MemoryError;

pub use turns::SqliteConversationStore;
pub use vectors::SqliteVectorIndex;

const IN_MEMORY: &str = ":memory:";
const FILE_POOL_SIZE: u32 = 5;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open `path` (created if absent, or `:memory:`) and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or a migration fails.
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let in_memory = path == IN_MEMORY;
        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };

        // each connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { FILE_POOL_SIZE })
            .connect_with(options)
            .await?;
        sqlx::migrate!("../../migrations").run(&pool).await?;

        tracing::debug!(path, "sqlite store ready");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_names(store: &SqliteStore) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(store.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn file_database_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.db");
        let store = SqliteStore::new(path.to_str().unwrap()).await.unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(mode, "wal");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn schema_has_index_and_turn_tables() {
        let store = SqliteStore::new(IN_MEMORY).await.unwrap();
        let tables = table_names(&store).await;
        for expected in ["chunks", "conversation_turns", "index_meta"] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn reopening_a_file_keeps_the_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.db");
        let path = path.to_str().unwrap();
        drop(SqliteStore::new(path).await.unwrap());

        let again = SqliteStore::new(path).await.unwrap();
        assert!(table_names(&again).await.iter().any(|t| t == "chunks"));
    }
}
