mod env;
mod types;


pub use types::*;

use std::path::Path;
use std::time::Duration;

use warden_llm::GenerationParams;
use warden_memory::document::SplitterConfig;

use crate::error::RagError;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the file exists but cannot be
    /// read or parsed.
    pub fn load(path: &Path) -> Result<Self, RagError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| {
                RagError::Configuration(format!(
                    "failed to read config file {}: {e}",
                    path.display()
                ))
            })?;
            toml::from_str::<Self>(&content).map_err(|e| {
                RagError::Configuration(format!(
                    "failed to parse config file {}: {e}",
                    path.display()
                ))
            })?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] describing the first violated
    /// constraint.
    pub fn validate(&self) -> Result<(), RagError> {
        self.splitter_config()
            .validate()
            .map_err(|e| RagError::Configuration(e.to_string()))?;
        if self.embedding.dimension == 0 {
            return Err(RagError::Configuration(
                "embedding.dimension must be greater than zero".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(RagError::Configuration(
                "retrieval.top_k must be greater than zero".into(),
            ));
        }
        if self.timeouts.llm_seconds == 0 || self.timeouts.embedding_seconds == 0 {
            return Err(RagError::Configuration(
                "timeouts must be greater than zero".into(),
            ));
        }
        if self.ingestion.concurrency == 0 {
            return Err(RagError::Configuration(
                "ingestion.concurrency must be greater than zero".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(RagError::Configuration(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.provider == ProviderKind::OpenAi {
            if self.llm.openai.is_none() {
                return Err(RagError::Configuration(
                    "llm.provider = \"openai\" requires an [llm.openai] section".into(),
                ));
            }
            if self.secrets.openai_api_key.is_none() {
                return Err(RagError::Configuration(
                    "WARDEN_OPENAI_API_KEY is not set".into(),
                ));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn splitter_config(&self) -> SplitterConfig {
        SplitterConfig {
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
        }
    }

    #[must_use]
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        }
    }

    #[must_use]
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.llm_seconds)
    }

    #[must_use]
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.embedding_seconds)
    }
}
