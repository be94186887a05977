//! Fixed-dimension, L2-normalized text embeddings.
//!
//! Every vector written to or queried against an index goes through
//! [`Embedder`], so ingestion and query time always agree on dimension and
//! normalization. With unit-length vectors cosine similarity and dot product
//! produce the same ranking.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::LlmError;

pub type EmbedFuture = Pin<Box<dyn Future<Output = Result<Vec<f32>, LlmError>> + Send>>;

/// Shareable embedding backend call.
pub type EmbedFn = Arc<dyn Fn(&str) -> EmbedFuture + Send + Sync>;

const EXCERPT_CHARS: usize = 48;

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding failed for \"{excerpt}\": {cause}")]
    Backend {
        excerpt: String,
        #[source]
        cause: LlmError,
    },

    #[error("embedding timed out after {timeout:?} for \"{excerpt}\"")]
    Timeout { excerpt: String, timeout: Duration },

    #[error("embedding for \"{excerpt}\" has zero or non-finite norm")]
    Degenerate { excerpt: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbedError {
    /// Dimension mismatches are configuration errors, not per-text failures.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. })
    }

    /// Short prefix of the text that failed, if the error is tied to one.
    #[must_use]
    pub fn excerpt(&self) -> Option<&str> {
        match self {
            Self::Backend { excerpt, .. }
            | Self::Timeout { excerpt, .. }
            | Self::Degenerate { excerpt } => Some(excerpt),
            Self::DimensionMismatch { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct Embedder {
    embed_fn: EmbedFn,
    dimension: usize,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("dimension", &self.dimension)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Embedder {
    #[must_use]
    pub fn new(embed_fn: EmbedFn, dimension: usize) -> Self {
        Self {
            embed_fn,
            dimension,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed a short sample text and report the backend's native dimension.
    ///
    /// Used at startup to fail fast when the configured dimension and the
    /// model disagree.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    pub async fn detect_dimension(embed_fn: &EmbedFn) -> Result<usize, EmbedError> {
        let sample = "dimension check";
        let vector = embed_fn(sample).await.map_err(|cause| EmbedError::Backend {
            excerpt: sample.to_owned(),
            cause,
        })?;
        Ok(vector.len())
    }

    /// Embed `text` into a unit-length vector of exactly `dimension` floats.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Backend`] or [`EmbedError::Timeout`] when the backend
    /// fails, [`EmbedError::DimensionMismatch`] when it returns a vector of the
    /// wrong length, and [`EmbedError::Degenerate`] when the vector cannot be
    /// normalized. A zero vector is never substituted.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let call = (self.embed_fn)(text);
        let result = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, call).await {
                Ok(r) => r,
                Err(_) => {
                    return Err(EmbedError::Timeout {
                        excerpt: excerpt(text),
                        timeout,
                    });
                }
            },
            None => call.await,
        };

        let mut vector = result.map_err(|cause| EmbedError::Backend {
            excerpt: excerpt(text),
            cause,
        })?;

        if vector.len() != self.dimension {
            return Err(EmbedError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        if !l2_normalize(&mut vector) {
            return Err(EmbedError::Degenerate {
                excerpt: excerpt(text),
            });
        }

        tracing::trace!(dimension = self.dimension, "embedded text");
        Ok(vector)
    }
}

/// Scale `vector` to unit length in place. Returns `false` (leaving the input
/// untouched) when the norm is zero or not finite.
pub fn l2_normalize(vector: &mut [f32]) -> bool {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for x in vector.iter_mut() {
        *x /= norm;
    }
    true
}

fn excerpt(text: &str) -> String {
    let mut out: String = text.chars().take(EXCERPT_CHARS).collect();
    if text.chars().count() > EXCERPT_CHARS {
        out.push_str("...");
    }
    out
}
