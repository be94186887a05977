//! Test-only mock LLM provider.

use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};

/// How the mock answers `embed` calls.
#[derive(Debug, Clone)]
pub enum MockEmbedding {
    Unsupported,
    /// Always return the same vector.
    Fixed(Vec<f32>),
    /// Deterministic hashed bag-of-words vector of the given dimension, so
    /// texts sharing words land close together.
    Hashed(usize),
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
    pub default_response: String,
    pub embedding: MockEmbedding,
    pub fail_chat: bool,
    /// Embedding calls whose text contains this marker fail.
    pub fail_embed_containing: Option<String>,
    /// Milliseconds to sleep before returning a chat response.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            embedding: MockEmbedding::Unsupported,
            fail_chat: false,
            fail_embed_containing: None,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_hashed_embeddings(mut self, dimension: usize) -> Self {
        self.embedding = MockEmbedding::Hashed(dimension);
        self
    }

    #[must_use]
    pub fn with_fixed_embedding(mut self, vector: Vec<f32>) -> Self {
        self.embedding = MockEmbedding::Fixed(vector);
        self
    }

    #[must_use]
    pub fn with_embed_failure_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_embed_containing = Some(marker.into());
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Every message list passed to `chat`, in call order.
    #[must_use]
    pub fn recorded_calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail_chat {
            return Err(LlmError::Rejected {
                provider: "mock",
                message: "scripted chat failure".into(),
            });
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if let Some(marker) = &self.fail_embed_containing
            && text.contains(marker.as_str())
        {
            return Err(LlmError::Rejected {
                provider: "mock",
                message: format!("scripted embed failure on {marker:?}"),
            });
        }
        match &self.embedding {
            MockEmbedding::Unsupported => Err(LlmError::EmbedUnsupported { provider: "mock" }),
            MockEmbedding::Fixed(v) => Ok(v.clone()),
            MockEmbedding::Hashed(dim) => Ok(hashed_bag_of_words(text, *dim)),
        }
    }

    fn supports_embeddings(&self) -> bool {
        !matches!(self.embedding, MockEmbedding::Unsupported)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

#[allow(clippy::cast_possible_truncation)]
fn hashed_bag_of_words(text: &str, dimension: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dimension.max(1)];
    let mut any = false;
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let h = fnv1a(&word.to_lowercase());
        let bucket = (h % v.len() as u64) as usize;
        v[bucket] += 1.0;
        any = true;
    }
    if !any {
        // Keep the vector normalizable for punctuation-only input.
        v[0] = 1.0;
    }
    v
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in s.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
