use chrono::{DateTime, Utc};

use super::SqliteStore;
use crate::conversation::{ConversationStore, ConversationTurn, TurnRole};
use crate::error::MemoryError;
use crate::types::SessionId;
use crate::vector_store::BoxFuture;

/// Conversation history persisted in `SQLite`, keyed by session id.
///
/// Arrival order is the autoincrement row id; a multi-turn append runs in a
/// single transaction.
#[derive(Debug, Clone)]
pub struct SqliteConversationStore {
    store: SqliteStore,
}

impl SqliteConversationStore {
    #[must_use]
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }
}

impl ConversationStore for SqliteConversationStore {
    fn get_history(
        &self,
        session: &SessionId,
    ) -> BoxFuture<'_, Result<Vec<ConversationTurn>, MemoryError>> {
        let session = session.clone();
        Box::pin(async move {
            let rows: Vec<(String, String, DateTime<Utc>)> = sqlx::query_as(
                "SELECT role, text, created_at FROM conversation_turns \
                 WHERE session_id = ? ORDER BY id ASC",
            )
            .bind(session.as_str())
            .fetch_all(self.store.pool())
            .await?;

            rows.into_iter()
                .map(|(role, text, timestamp)| {
                    Ok(ConversationTurn {
                        role: role.parse::<TurnRole>()?,
                        text,
                        timestamp,
                    })
                })
                .collect()
        })
    }

    fn append(
        &self,
        session: &SessionId,
        turn: ConversationTurn,
    ) -> BoxFuture<'_, Result<(), MemoryError>> {
        self.append_all(session, vec![turn])
    }

    fn append_all(
        &self,
        session: &SessionId,
        turns: Vec<ConversationTurn>,
    ) -> BoxFuture<'_, Result<(), MemoryError>> {
        let session = session.clone();
        Box::pin(async move {
            let mut tx = self.store.pool().begin().await?;
            for turn in &turns {
                sqlx::query(
                    "INSERT INTO conversation_turns (session_id, role, text, created_at) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(session.as_str())
                .bind(turn.role.as_str())
                .bind(&turn.text)
                .bind(turn.timestamp)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok(())
        })
    }

    fn clear(&self, session: &SessionId) -> BoxFuture<'_, Result<usize, MemoryError>> {
        let session = session.clone();
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM conversation_turns WHERE session_id = ?")
                .bind(session.as_str())
                .execute(self.store.pool())
                .await?;
            Ok(usize::try_from(result.rows_affected())?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteConversationStore {
        SqliteConversationStore::new(SqliteStore::new(":memory:").await.unwrap())
    }

    #[tokio::test]
    async fn unknown_session_is_empty() {
        let store = store().await;
        assert!(store.get_history(&"ghost".into()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_round_trips_in_order() {
        let store = store().await;
        let s = SessionId::new("alice");
        store
            .append_all(
                &s,
                vec![
                    ConversationTurn::human("what is the vacation policy?"),
                    ConversationTurn::assistant("20 days [1]"),
                ],
            )
            .await
            .unwrap();
        store.append(&s, ConversationTurn::human("and sick leave?")).await.unwrap();

        let history = store.get_history(&s).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, TurnRole::Human);
        assert_eq!(history[1].text, "20 days [1]");
        assert_eq!(history[2].text, "and sick leave?");
    }

    #[tokio::test]
    async fn history_survives_reopen() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let s = SessionId::new("bob");
        {
            let store = SqliteConversationStore::new(SqliteStore::new(path).await.unwrap());
            store.append(&s, ConversationTurn::human("hello")).await.unwrap();
        }
        let store = SqliteConversationStore::new(SqliteStore::new(path).await.unwrap());
        let history = store.get_history(&s).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "hello");
    }

    #[tokio::test]
    async fn clear_removes_only_that_session() {
        let store = store().await;
        store
            .append(&"a".into(), ConversationTurn::human("x"))
            .await
            .unwrap();
        store
            .append(&"b".into(), ConversationTurn::human("y"))
            .await
            .unwrap();
        assert_eq!(store.clear(&"a".into()).await.unwrap(), 1);
        assert!(store.get_history(&"a".into()).await.unwrap().is_empty());
        assert_eq!(store.get_history(&"b".into()).await.unwrap().len(), 1);
    }
}
