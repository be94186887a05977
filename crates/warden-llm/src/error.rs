/// Failure talking to a chat or embedding backend.
///
/// None of these are retried by warden; the caller decides whether to surface
/// them as a gateway error or abort startup.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed backend reply: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{provider} is unreachable: {reason}")]
    Unreachable {
        provider: &'static str,
        reason: String,
    },

    #[error("rate limited")]
    RateLimited,

    #[error("{provider} returned status {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("{provider} rejected the request: {message}")]
    Rejected {
        provider: &'static str,
        message: String,
    },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: &'static str },
}

impl LlmError {
    /// Backend that produced the error, when known.
    #[must_use]
    pub fn provider(&self) -> Option<&'static str> {
        match self {
            Self::Unreachable { provider, .. }
            | Self::Status { provider, .. }
            | Self::Rejected { provider, .. }
            | Self::EmptyResponse { provider }
            | Self::EmbedUnsupported { provider } => Some(provider),
            Self::Http(_) | Self::Json(_) | Self::RateLimited => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_is_reported_where_known() {
        let err = LlmError::Status {
            provider: "openai",
            status: 500,
        };
        assert_eq!(err.provider(), Some("openai"));
        assert_eq!(err.to_string(), "openai returned status 500");
        assert_eq!(LlmError::RateLimited.provider(), None);
    }

    #[test]
    fn rejected_carries_backend_message() {
        let err = LlmError::Rejected {
            provider: "ollama",
            message: "model \"x\" not found".into(),
        };
        assert!(err.to_string().contains("model \"x\" not found"));
    }
}
