//! Per-session turn history.

mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::InMemoryConversationStore;

use crate::error::MemoryError;
use crate::types::SessionId;
use crate::vector_store::BoxFuture;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    Human,
    Assistant,
}

impl TurnRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for TurnRole {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(Self::Human),
            "assistant" => Ok(Self::Assistant),
            other => Err(MemoryError::Corrupt(format!("unknown turn role {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    #[must_use]
    pub fn human(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Human,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered turn history keyed by session.
///
/// Unknown sessions read as empty histories. Appends within one session are
/// serialized and kept in arrival order; sessions never block each other.
pub trait ConversationStore: Send + Sync {
    fn get_history(
        &self,
        session: &SessionId,
    ) -> BoxFuture<'_, Result<Vec<ConversationTurn>, MemoryError>>;

    fn append(
        &self,
        session: &SessionId,
        turn: ConversationTurn,
    ) -> BoxFuture<'_, Result<(), MemoryError>>;

    /// Append several turns as one unit; no other append to the same session
    /// lands between them.
    fn append_all(
        &self,
        session: &SessionId,
        turns: Vec<ConversationTurn>,
    ) -> BoxFuture<'_, Result<(), MemoryError>>;

    /// Drop every turn of `session` and return how many were removed.
    fn clear(&self, session: &SessionId) -> BoxFuture<'_, Result<usize, MemoryError>>;
}
