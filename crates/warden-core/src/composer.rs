//! Role-filtered retrieval followed by one grounded generation call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use warden_llm::{Embedder, LlmProvider, Message};
use warden_memory::{
    ChunkId, ConversationStore, ConversationTurn, Predicate, RetrievalResult, SessionId,
    TurnRole, VectorIndex,
};

use crate::config::Config;
use crate::error::RagError;
use crate::prompt;

#[derive(Debug, Clone)]
pub struct ComposerSettings {
    pub assistant_name: String,
    pub top_k: usize,
    /// Most recent turns replayed into the prompt. `0` replays everything.
    /// A window that would open on an answer drops that answer.
    pub history_limit: usize,
    pub generation_timeout: Duration,
}

impl ComposerSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            assistant_name: config.agent.name.clone(),
            top_k: config.retrieval.top_k,
            history_limit: config.conversation.history_limit,
            generation_timeout: config.llm_timeout(),
        }
    }
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A chunk that was supplied to the model as context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub chunk_id: ChunkId,
    pub source_id: String,
    pub score: f32,
    pub text: String,
}

impl From<RetrievalResult> for Citation {
    fn from(r: RetrievalResult) -> Self {
        Self {
            chunk_id: r.chunk_id,
            source_id: r.source_id,
            score: r.score,
            text: r.text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// In context-block order, so `citations[n - 1]` is the `[n]` source.
    pub citations: Vec<Citation>,
}

impl Answer {
    #[must_use]
    pub fn cited_chunk_ids(&self) -> Vec<ChunkId> {
        self.citations.iter().map(|c| c.chunk_id).collect()
    }
}

pub struct AnswerComposer<P> {
    provider: P,
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    conversations: Arc<dyn ConversationStore>,
    settings: ComposerSettings,
}

impl<P: LlmProvider> AnswerComposer<P> {
    #[must_use]
    pub fn new(
        provider: P,
        embedder: Embedder,
        index: Arc<dyn VectorIndex>,
        conversations: Arc<dyn ConversationStore>,
        settings: ComposerSettings,
    ) -> Self {
        Self {
            provider,
            embedder,
            index,
            conversations,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ComposerSettings {
        &self.settings
    }

    /// Answer `query` for a caller holding `role`, continuing `session`.
    ///
    /// # Errors
    ///
    /// See [`AnswerComposer::answer_within`].
    pub async fn answer(
        &self,
        query: &str,
        role: &str,
        session: &SessionId,
    ) -> Result<Answer, RagError> {
        self.answer_within(query, role, session, self.settings.generation_timeout)
            .await
    }

    /// Like [`AnswerComposer::answer`] with an explicit generation timeout.
    ///
    /// When nothing visible to `role` matches, the model is not called and
    /// a fixed "not enough information" answer is returned. The human turn
    /// and the answer are appended to the session together, and only after
    /// a successful generation.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the query cannot be embedded,
    /// [`RagError::Retrieval`] or [`RagError::Conversation`] on store
    /// failures, [`RagError::Generation`] if the model call fails and
    /// [`RagError::GenerationTimeout`] if it does not finish in `timeout`.
    pub async fn answer_within(
        &self,
        query: &str,
        role: &str,
        session: &SessionId,
        timeout: Duration,
    ) -> Result<Answer, RagError> {
        let start = Instant::now();
        let predicate = Predicate::for_role(role);

        let vector = self.embedder.embed(query).await?;
        let results = self
            .index
            .query(vector, &predicate, self.settings.top_k)
            .await
            .map_err(RagError::retrieval)?;

        let history = self.conversations.get_history(session).await?;

        let text = if results.is_empty() {
            tracing::info!(session_id = %session, role, "no visible context, skipping generation");
            prompt::INSUFFICIENT_CONTEXT_ANSWER.to_owned()
        } else {
            let messages = self.build_messages(query, &results, &history);
            match tokio::time::timeout(timeout, self.provider.chat(&messages)).await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    tracing::error!(
                        session_id = %session,
                        provider = self.provider.name(),
                        "generation failed: {e}"
                    );
                    return Err(RagError::Generation(e));
                }
                Err(_) => {
                    tracing::warn!(
                        session_id = %session,
                        timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        "generation timed out"
                    );
                    return Err(RagError::GenerationTimeout(timeout));
                }
            }
        };

        self.conversations
            .append_all(
                session,
                vec![
                    ConversationTurn::human(query),
                    ConversationTurn::assistant(text.clone()),
                ],
            )
            .await?;

        tracing::info!(
            session_id = %session,
            role,
            k = self.settings.top_k,
            hits = results.len(),
            latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "answer composed"
        );

        Ok(Answer {
            text,
            citations: results.into_iter().map(Citation::from).collect(),
        })
    }

    fn build_messages(
        &self,
        query: &str,
        results: &[RetrievalResult],
        history: &[ConversationTurn],
    ) -> Vec<Message> {
        let today = chrono::Local::now().date_naive();
        let replay = replayed_history(history, self.settings.history_limit);

        let mut messages = Vec::with_capacity(replay.len() + 2);
        messages.push(Message::system(prompt::system_prompt(
            &self.settings.assistant_name,
            today,
        )));
        messages.extend(replay.iter().map(|turn| match turn.role {
            TurnRole::Human => Message::user(turn.text.clone()),
            TurnRole::Assistant => Message::assistant(turn.text.clone()),
        }));
        messages.push(Message::user(prompt::user_turn(query, results)));
        messages
    }
}

/// The latest `limit` turns (all when `0`), starting on a human turn.
fn replayed_history(history: &[ConversationTurn], limit: usize) -> &[ConversationTurn] {
    let tail = match limit {
        0 => history,
        limit => &history[history.len().saturating_sub(limit)..],
    };
    let first_human = tail
        .iter()
        .position(|turn| turn.role == TurnRole::Human)
        .unwrap_or(tail.len());
    &tail[first_human..]
}

#[cfg(test)]
mod tests {
    use warden_llm::mock::MockProvider;
    use warden_llm::{AnyProvider, Role};
    use warden_memory::{
        AccessLabel, InMemoryConversationStore, InMemoryVectorIndex, IndexedVector,
    };

    use super::*;

    const DIM: usize = 64;

    async fn seeded_index(mock: &MockProvider) -> Arc<InMemoryVectorIndex> {
        let index = Arc::new(InMemoryVectorIndex::new(DIM));
        let embedder = Embedder::new(AnyProvider::Mock(mock.clone()).embed_fn(), DIM);
        let rows = [
            ("finance/q3.md", "finance", "Quarterly revenue grew twelve percent"),
            ("general/holidays.md", "general", "The office closes for the holidays"),
        ];
        let mut entries = Vec::new();
        for (source, label, text) in rows {
            entries.push(IndexedVector {
                chunk_id: ChunkId::derive(source, 0),
                source_id: source.into(),
                sequence_index: 0,
                embedding: embedder.embed(text).await.unwrap(),
                text: text.into(),
                access_label: AccessLabel::new(label).unwrap(),
            });
        }
        index.upsert(entries).await.unwrap();
        index
    }

    fn composer(
        mock: MockProvider,
        index: Arc<InMemoryVectorIndex>,
        store: Arc<InMemoryConversationStore>,
        settings: ComposerSettings,
    ) -> AnswerComposer<MockProvider> {
        let embedder = Embedder::new(AnyProvider::Mock(mock.clone()).embed_fn(), DIM);
        AnswerComposer::new(mock, embedder, index, store, settings)
    }

    #[tokio::test]
    async fn prompt_has_system_history_and_context() {
        let mock = MockProvider::with_responses(vec!["first".into(), "second".into()])
            .with_hashed_embeddings(DIM);
        let index = seeded_index(&mock).await;
        let store = Arc::new(InMemoryConversationStore::new());
        let c = composer(mock.clone(), index, store, ComposerSettings::default());
        let session = SessionId::from("alice");

        c.answer("quarterly revenue", "finance", &session).await.unwrap();
        c.answer("and the holidays?", "finance", &session).await.unwrap();

        let calls = mock.recorded_calls();
        let second = &calls[1];
        assert_eq!(second[0].role, Role::System);
        assert_eq!(second[1], Message::user("quarterly revenue"));
        assert_eq!(second[2], Message::assistant("first"));
        assert_eq!(second.last().unwrap().role, Role::User);
        assert!(second.last().unwrap().content.contains("[1] (source: "));
    }

    #[tokio::test]
    async fn history_limit_keeps_latest_turns() {
        let mock = MockProvider::default().with_hashed_embeddings(DIM);
        let index = seeded_index(&mock).await;
        let store = Arc::new(InMemoryConversationStore::new());
        let settings = ComposerSettings {
            history_limit: 2,
            ..ComposerSettings::default()
        };
        let c = composer(mock.clone(), index, store, settings);
        let session = SessionId::from("bob");

        for q in ["holidays one", "holidays two", "holidays three"] {
            c.answer(q, "general", &session).await.unwrap();
        }

        let last = mock.recorded_calls().pop().unwrap();
        // system + two replayed turns + new user turn
        assert_eq!(last.len(), 4);
        assert_eq!(last[1], Message::user("holidays two"));
    }

    #[tokio::test]
    async fn odd_history_limit_starts_on_a_question() {
        let mock = MockProvider::default().with_hashed_embeddings(DIM);
        let index = seeded_index(&mock).await;
        let store = Arc::new(InMemoryConversationStore::new());
        let settings = ComposerSettings {
            history_limit: 3,
            ..ComposerSettings::default()
        };
        let c = composer(mock.clone(), index, store, settings);
        let session = SessionId::from("dana");

        for q in ["holidays one", "holidays two", "holidays three"] {
            c.answer(q, "general", &session).await.unwrap();
        }

        let last = mock.recorded_calls().pop().unwrap();
        // system + one whole exchange + new user turn
        assert_eq!(last.len(), 4);
        assert_eq!(last[1], Message::user("holidays two"));
        assert_eq!(last[2].role, Role::Assistant);
    }

    #[test]
    fn replay_window_never_opens_on_an_answer() {
        let history = vec![
            ConversationTurn::human("q1"),
            ConversationTurn::assistant("a1"),
            ConversationTurn::human("q2"),
            ConversationTurn::assistant("a2"),
        ];
        assert_eq!(replayed_history(&history, 3).len(), 2);
        assert_eq!(replayed_history(&history, 3)[0].role, TurnRole::Human);
        assert_eq!(replayed_history(&history, 0).len(), 4);
        assert!(replayed_history(&history, 1).is_empty());
    }

    #[tokio::test]
    async fn empty_retrieval_skips_model_and_records_turn() {
        let mock = MockProvider::default().with_hashed_embeddings(DIM);
        let index = Arc::new(InMemoryVectorIndex::new(DIM));
        let store = Arc::new(InMemoryConversationStore::new());
        let c = composer(mock.clone(), index, Arc::clone(&store), ComposerSettings::default());
        let session = SessionId::from("carol");

        let answer = c.answer("anything", "sales", &session).await.unwrap();
        assert_eq!(answer.text, prompt::INSUFFICIENT_CONTEXT_ANSWER);
        assert!(answer.citations.is_empty());
        assert!(mock.recorded_calls().is_empty());
        assert_eq!(store.get_history(&session).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_generation_leaves_history_untouched() {
        let mock = MockProvider::failing().with_hashed_embeddings(DIM);
        let index = seeded_index(&mock).await;
        let store = Arc::new(InMemoryConversationStore::new());
        let c = composer(mock, index, Arc::clone(&store), ComposerSettings::default());
        let session = SessionId::from("dave");

        let err = c.answer("holidays", "general", &session).await.unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
        assert!(store.get_history(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn citations_follow_context_order() {
        let mock = MockProvider::default().with_hashed_embeddings(DIM);
        let index = seeded_index(&mock).await;
        let store = Arc::new(InMemoryConversationStore::new());
        let c = composer(mock, index, store, ComposerSettings::default());

        let answer = c
            .answer("quarterly revenue grew", "finance", &SessionId::from("erin"))
            .await
            .unwrap();
        assert_eq!(answer.citations.len(), 2);
        assert_eq!(answer.citations[0].source_id, "finance/q3.md");
        assert!(answer.citations[0].score >= answer.citations[1].score);
        assert_eq!(answer.cited_chunk_ids()[0], ChunkId::derive("finance/q3.md", 0));
    }
}
