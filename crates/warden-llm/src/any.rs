use std::sync::Arc;

use crate::embedder::{EmbedFn, EmbedFuture};
use crate::error::LlmError;
#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{LlmProvider, Message};

/// Runs `$body` against whichever backend `$this` wraps.
macro_rules! with_backend {
    ($this:expr, $backend:ident => $body:expr) => {
        match $this {
            AnyProvider::Ollama($backend) => $body,
            AnyProvider::OpenAi($backend) => $body,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($backend) => $body,
        }
    };
}

/// The configured chat/embedding backend, chosen at startup.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    Ollama(OllamaProvider),
    OpenAi(OpenAiProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl AnyProvider {
    /// Type-erased embedding call for [`crate::Embedder`], which outlives any borrow of `self`.
    #[must_use]
    pub fn embed_fn(&self) -> EmbedFn {
        let shared = Arc::new(self.clone());
        Arc::new(move |text: &str| -> EmbedFuture {
            let backend = Arc::clone(&shared);
            let text = text.to_owned();
            Box::pin(async move { backend.embed(&text).await })
        })
    }
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        with_backend!(self, backend => backend.chat(messages).await)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        with_backend!(self, backend => backend.embed(text).await)
    }

    fn supports_embeddings(&self) -> bool {
        with_backend!(self, backend => backend.supports_embeddings())
    }

    fn name(&self) -> &str {
        with_backend!(self, backend => backend.name())
    }
}
