use std::time::Duration;

use warden_llm::{EmbedError, LlmError};
use warden_memory::document::DocumentError;
use warden_memory::{MemoryError, VectorStoreError};

/// Failure classes surfaced to callers of the query and ingestion paths.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// Invalid settings or mismatched dimensions. Aborts startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("embedding failed: {0}")]
    Embedding(#[source] EmbedError),

    #[error("index write failed: {0}")]
    IndexWrite(#[source] VectorStoreError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[source] VectorStoreError),

    #[error("conversation store failed: {0}")]
    Conversation(#[from] MemoryError),

    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("unknown principal: {0}")]
    UnknownPrincipal(String),
}

/// Transport-neutral classification of a [`RagError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusHint {
    Unauthorized,
    Internal,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
}

impl StatusHint {
    #[must_use]
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Internal => 500,
            Self::BadGateway => 502,
            Self::ServiceUnavailable => 503,
            Self::GatewayTimeout => 504,
        }
    }
}

impl RagError {
    /// Errors that no retry can fix without changing configuration.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    #[must_use]
    pub fn status_hint(&self) -> StatusHint {
        match self {
            Self::UnknownPrincipal(_) => StatusHint::Unauthorized,
            Self::Configuration(_) | Self::Conversation(_) | Self::IndexWrite(_) => {
                StatusHint::Internal
            }
            Self::Embedding(_) | Self::Generation(_) => StatusHint::BadGateway,
            Self::Retrieval(_) => StatusHint::ServiceUnavailable,
            Self::GenerationTimeout(_) => StatusHint::GatewayTimeout,
        }
    }

    pub(crate) fn retrieval(e: VectorStoreError) -> Self {
        if e.is_configuration() {
            Self::Configuration(e.to_string())
        } else {
            Self::Retrieval(e)
        }
    }

    pub(crate) fn index_write(e: VectorStoreError) -> Self {
        if e.is_configuration() {
            Self::Configuration(e.to_string())
        } else {
            Self::IndexWrite(e)
        }
    }
}

impl From<EmbedError> for RagError {
    fn from(e: EmbedError) -> Self {
        if e.is_configuration() {
            Self::Configuration(e.to_string())
        } else {
            Self::Embedding(e)
        }
    }
}

impl From<DocumentError> for RagError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::Embedding(inner) => inner.into(),
            DocumentError::Index(inner) => Self::index_write(inner),
            other => Self::Configuration(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_is_fatal_configuration() {
        let err: RagError = EmbedError::DimensionMismatch {
            expected: 768,
            actual: 384,
        }
        .into();
        assert!(err.is_fatal());
        assert_eq!(err.status_hint(), StatusHint::Internal);

        let err = RagError::retrieval(VectorStoreError::DimensionMismatch {
            expected: 3,
            actual: 4,
        });
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn backend_failures_are_retryable() {
        let err: RagError = EmbedError::Degenerate {
            excerpt: "...".into(),
        }
        .into();
        assert!(matches!(err, RagError::Embedding(_)));
        assert!(!err.is_fatal());
        assert_eq!(err.status_hint().as_u16(), 502);

        let err = RagError::retrieval(VectorStoreError::Search("down".into()));
        assert_eq!(err.status_hint().as_u16(), 503);
    }

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        let err = RagError::GenerationTimeout(Duration::from_secs(30));
        assert_eq!(err.status_hint(), StatusHint::GatewayTimeout);
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn document_errors_split_by_cause() {
        let err: RagError =
            DocumentError::Index(VectorStoreError::Upsert("disk full".into())).into();
        assert!(matches!(err, RagError::IndexWrite(_)));

        let err: RagError = DocumentError::InvalidSplitter("overlap".into()).into();
        assert!(err.is_fatal());
    }
}
