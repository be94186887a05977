use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use super::{ConversationStore, ConversationTurn};
use crate::error::MemoryError;
use crate::types::SessionId;
use crate::vector_store::BoxFuture;

type SessionLog = Arc<Mutex<Vec<ConversationTurn>>>;

/// Memory-only history, lost on restart.
///
/// The session map lock is held only to look up or create a session's log;
/// each log has its own lock, so sessions do not contend.
#[derive(Default)]
pub struct InMemoryConversationStore {
    sessions: RwLock<HashMap<SessionId, SessionLog>>,
}

impl InMemoryConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&self, session: &SessionId) -> Result<SessionLog, MemoryError> {
        if let Some(log) = self
            .sessions
            .read()
            .map_err(|_| MemoryError::Poisoned)?
            .get(session)
        {
            return Ok(Arc::clone(log));
        }
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| MemoryError::Poisoned)?;
        Ok(Arc::clone(sessions.entry(session.clone()).or_default()))
    }
}

impl std::fmt::Debug for InMemoryConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryConversationStore")
            .finish_non_exhaustive()
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn get_history(
        &self,
        session: &SessionId,
    ) -> BoxFuture<'_, Result<Vec<ConversationTurn>, MemoryError>> {
        let session = session.clone();
        Box::pin(async move {
            let log = self.session(&session)?;
            let turns = log.lock().await;
            Ok(turns.clone())
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
            let log = self.session(&session)?;
            log.lock().await.extend(turns);
            Ok(())
        })
    }

    fn clear(&self, session: &SessionId) -> BoxFuture<'_, Result<usize, MemoryError>> {
        let session = session.clone();
        Box::pin(async move {
            let log = self.session(&session)?;
            let mut turns = log.lock().await;
            let removed = turns.len();
            turns.clear();
            Ok(removed)
        })
    }
}
