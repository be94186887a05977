//! Language-model and embedding backends.

pub mod any;
pub mod embedder;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;

pub use any::AnyProvider;
pub use embedder::{EmbedError, Embedder};
pub use error::LlmError;
pub use provider::{GenerationParams, LlmProvider, Message, Role};
