//! Startup wiring: one explicit context instead of process-wide singletons.

use std::path::Path;
use std::sync::Arc;

use warden_llm::ollama::OllamaProvider;
use warden_llm::openai::OpenAiProvider;
use warden_llm::{AnyProvider, Embedder};
use warden_memory::document::{DirectorySource, IngestionPipeline, TextLoader, TextSplitter};
use warden_memory::{
    ConversationStore, InMemoryConversationStore, InMemoryVectorIndex, QdrantVectorIndex,
    SqliteConversationStore, SqliteStore, SqliteVectorIndex, VectorIndex,
};

use crate::composer::{AnswerComposer, ComposerSettings};
use crate::config::{Config, ConversationBackend, IndexBackend, ProviderKind};
use crate::error::RagError;
use crate::principal::StaticPrincipals;

/// Everything a query or ingestion run needs, built once at startup.
pub struct RagContext {
    config: Config,
    provider: AnyProvider,
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    conversations: Arc<dyn ConversationStore>,
    principals: StaticPrincipals,
}

impl RagContext {
    /// Build every backend named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] for invalid settings, unreachable
    /// storage, or when the embedding model, the configured dimension and
    /// the index disagree.
    pub async fn build(config: Config) -> Result<Self, RagError> {
        config.validate()?;
        let provider = create_provider(&config)?;
        health_check(&provider).await;
        let index = open_index(&config).await?;
        let conversations = open_conversations(&config).await?;
        Self::assemble(config, provider, index, conversations).await
    }

    /// Wire already-constructed backends together.
    ///
    /// Embeds one sample text so a model whose native dimension differs
    /// from `embedding.dimension` fails here instead of on the first write.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] on any dimension disagreement, or
    /// [`RagError::Embedding`] if that call fails.
    pub async fn assemble(
        config: Config,
        provider: AnyProvider,
        index: Arc<dyn VectorIndex>,
        conversations: Arc<dyn ConversationStore>,
    ) -> Result<Self, RagError> {
        config.validate()?;
        let dimension = config.embedding.dimension;
        if index.dimension() != dimension {
            return Err(RagError::Configuration(format!(
                "index dimension {} does not match embedding.dimension {dimension}",
                index.dimension()
            )));
        }

        let embed_fn = provider.embed_fn();
        let native = Embedder::detect_dimension(&embed_fn).await?;
        if native != dimension {
            return Err(RagError::Configuration(format!(
                "embedding model produces {native}-dimensional vectors but embedding.dimension is {dimension}"
            )));
        }
        let embedder = Embedder::new(embed_fn, dimension).with_timeout(config.embedding_timeout());

        tracing::info!(
            provider = %config.llm.provider,
            index = %config.index.backend,
            conversation = %config.conversation.backend,
            dimension,
            "context ready"
        );

        let principals = StaticPrincipals::new(config.principals.clone());
        Ok(Self {
            config,
            provider,
            embedder,
            index,
            conversations,
            principals,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn provider(&self) -> &AnyProvider {
        &self.provider
    }

    #[must_use]
    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    #[must_use]
    pub fn index(&self) -> Arc<dyn VectorIndex> {
        Arc::clone(&self.index)
    }

    #[must_use]
    pub fn conversations(&self) -> Arc<dyn ConversationStore> {
        Arc::clone(&self.conversations)
    }

    #[must_use]
    pub fn principals(&self) -> &StaticPrincipals {
        &self.principals
    }

    #[must_use]
    pub fn composer(&self) -> AnswerComposer<AnyProvider> {
        AnswerComposer::new(
            self.provider.clone(),
            self.embedder.clone(),
            self.index(),
            self.conversations(),
            ComposerSettings::from_config(&self.config),
        )
    }

    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the tokenizer cannot be loaded.
    pub fn pipeline(&self) -> Result<IngestionPipeline, RagError> {
        let splitter = build_splitter(&self.config)?;
        Ok(
            IngestionPipeline::new(splitter, self.embedder.clone(), self.index())
                .with_concurrency(self.config.ingestion.concurrency),
        )
    }

    /// Directory source rooted at `root`, or at `ingestion.source_dir`.
    #[must_use]
    pub fn directory_source(&self, root: Option<&Path>) -> DirectorySource {
        let root = root.map_or_else(
            || Path::new(&self.config.ingestion.source_dir).to_path_buf(),
            Path::to_path_buf,
        );
        DirectorySource::with_loader(
            root,
            TextLoader {
                max_file_size: self.config.ingestion.max_file_size,
            },
        )
    }
}

/// # Errors
///
/// Returns [`RagError::Configuration`] when the selected provider is missing
/// its settings or its HTTP client cannot be built.
pub fn create_provider(config: &Config) -> Result<AnyProvider, RagError> {
    let params = config.generation_params();
    match config.llm.provider {
        ProviderKind::Ollama => {
            let provider = OllamaProvider::new(
                &config.llm.base_url,
                config.llm.model.clone(),
                config.llm.embedding_model.clone(),
            )
            .with_params(params);
            Ok(AnyProvider::Ollama(provider))
        }
        ProviderKind::OpenAi => {
            let openai = config.llm.openai.as_ref().ok_or_else(|| {
                RagError::Configuration("llm.openai config section required".into())
            })?;
            let api_key = config.secrets.openai_api_key.as_ref().ok_or_else(|| {
                RagError::Configuration("WARDEN_OPENAI_API_KEY is not set".into())
            })?;
            let provider = OpenAiProvider::new(
                api_key.expose().to_owned(),
                openai.base_url.clone(),
                openai.model.clone(),
                openai.embedding_model.clone(),
                config.llm_timeout(),
            )
            .map_err(|e| RagError::Configuration(e.to_string()))?
            .with_params(params);
            Ok(AnyProvider::OpenAi(provider))
        }
    }
}

/// Log whether a local Ollama server answers. Other providers are not checked.
pub async fn health_check(provider: &AnyProvider) {
    if let AnyProvider::Ollama(ollama) = provider {
        match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
        }
    }
}

async fn open_sqlite(path: &str) -> Result<SqliteStore, RagError> {
    if path != ":memory:"
        && let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            RagError::Configuration(format!("cannot create {}: {e}", parent.display()))
        })?;
    }
    SqliteStore::new(path)
        .await
        .map_err(|e| RagError::Configuration(format!("cannot open sqlite database {path}: {e}")))
}

/// Open the configured vector index without touching the language model.
///
/// # Errors
///
/// Returns [`RagError::Configuration`] if the backend cannot be reached or
/// was created with another dimension.
pub async fn open_index(config: &Config) -> Result<Arc<dyn VectorIndex>, RagError> {
    let dimension = config.embedding.dimension;
    let index: Arc<dyn VectorIndex> = match config.index.backend {
        IndexBackend::Memory => Arc::new(InMemoryVectorIndex::new(dimension)),
        IndexBackend::Sqlite => {
            let store = open_sqlite(&config.index.sqlite_path).await?;
            Arc::new(
                SqliteVectorIndex::open(store, dimension)
                    .await
                    .map_err(|e| RagError::Configuration(e.to_string()))?,
            )
        }
        IndexBackend::Qdrant => {
            Arc::new(
                QdrantVectorIndex::connect(
                    &config.index.qdrant_url,
                    config.index.collection.clone(),
                    dimension,
                )
                .await
                .map_err(|e| RagError::Configuration(e.to_string()))?,
            )
        }
    };
    tracing::debug!(backend = %config.index.backend, dimension, "vector index opened");
    Ok(index)
}

/// # Errors
///
/// Returns [`RagError::Configuration`] if the `SQLite` database cannot be
/// opened.
pub async fn open_conversations(config: &Config) -> Result<Arc<dyn ConversationStore>, RagError> {
    Ok(match config.conversation.backend {
        ConversationBackend::Memory => Arc::new(InMemoryConversationStore::new()),
        ConversationBackend::Sqlite => {
            let store = open_sqlite(&config.conversation.sqlite_path).await?;
            Arc::new(SqliteConversationStore::new(store))
        }
    })
}

/// # Errors
///
/// Returns [`RagError::Configuration`] for invalid chunking settings or a
/// tokenizer that cannot be loaded.
pub fn build_splitter(config: &Config) -> Result<TextSplitter, RagError> {
    let splitter_config = config.splitter_config();
    match config.chunking.tokenizer.as_str() {
        "words" => Ok(TextSplitter::new(splitter_config)?),
        #[cfg(feature = "hf-tokenizer")]
        path => {
            let tokenizer =
                warden_memory::document::HfTokenizer::from_file(Path::new(path))?;
            Ok(TextSplitter::with_tokenizer(
                splitter_config,
                Arc::new(tokenizer),
            )?)
        }
        #[cfg(not(feature = "hf-tokenizer"))]
        other => Err(RagError::Configuration(format!(
            "tokenizer {other:?} requires the hf-tokenizer feature"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use warden_llm::mock::MockProvider;

    use super::*;

    fn memory_config(dimension: usize) -> Config {
        let mut config = Config::default();
        config.embedding.dimension = dimension;
        config.index.backend = IndexBackend::Memory;
        config.conversation.backend = ConversationBackend::Memory;
        config
    }

    async fn assemble(config: Config, mock: MockProvider) -> Result<RagContext, RagError> {
        let index = open_index(&config).await.unwrap();
        let conversations = open_conversations(&config).await.unwrap();
        RagContext::assemble(config, AnyProvider::Mock(mock), index, conversations).await
    }

    #[tokio::test]
    async fn health_check_only_logs() {
        health_check(&AnyProvider::Mock(MockProvider::default())).await;
        let unreachable = OllamaProvider::new(
            "http://127.0.0.1:1",
            "llama3".into(),
            "nomic-embed-text".into(),
        );
        tokio::time::timeout(
            std::time::Duration::from_secs(10),
            health_check(&AnyProvider::Ollama(unreachable)),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn assembles_with_matching_dimension() {
        let ctx = assemble(
            memory_config(32),
            MockProvider::default().with_hashed_embeddings(32),
        )
        .await
        .unwrap();
        assert_eq!(ctx.embedder().dimension(), 32);
        assert_eq!(ctx.index().dimension(), 32);
        assert!(ctx.pipeline().is_ok());
    }

    #[tokio::test]
    async fn model_dimension_mismatch_fails_fast() {
        let err = assemble(
            memory_config(32),
            MockProvider::default().with_hashed_embeddings(16),
        )
        .await
        .err()
        .unwrap();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("16-dimensional"));
    }

    #[tokio::test]
    async fn index_dimension_mismatch_fails_fast() {
        let config = memory_config(32);
        let index: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::new(8));
        let conversations = open_conversations(&config).await.unwrap();
        let err = RagContext::assemble(
            config,
            AnyProvider::Mock(MockProvider::default().with_hashed_embeddings(32)),
            index,
            conversations,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[tokio::test]
    async fn provider_without_embeddings_is_rejected() {
        let err = assemble(memory_config(32), MockProvider::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RagError::Embedding(_)));
    }

    #[tokio::test]
    async fn sqlite_index_reopen_with_other_dimension_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("warden.db");
        let mut config = memory_config(16);
        config.index.backend = IndexBackend::Sqlite;
        config.index.sqlite_path = path.to_string_lossy().into_owned();

        let index = open_index(&config).await.unwrap();
        assert_eq!(index.dimension(), 16);
        drop(index);

        config.embedding.dimension = 24;
        let err = open_index(&config).await.err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn unknown_tokenizer_without_feature_is_rejected() {
        let mut config = Config::default();
        config.chunking.tokenizer = "/nonexistent/tokenizer.json".into();
        assert!(build_splitter(&config).is_err());
    }

    #[test]
    fn word_splitter_uses_configured_window() {
        let mut config = Config::default();
        config.chunking.chunk_size = 10;
        config.chunking.chunk_overlap = 2;
        let splitter = build_splitter(&config).unwrap();
        assert_eq!(splitter.config().chunk_size, 10);
    }

    #[test]
    fn openai_provider_needs_key() {
        let mut config = Config::default();
        config.llm.provider = ProviderKind::OpenAi;
        config.llm.openai = Some(crate::config::OpenAiConfig {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            embedding_model: Some("text-embedding-3-small".into()),
        });
        assert!(create_provider(&config).is_err());

        config.secrets.openai_api_key = Some(crate::config::Secret::new("sk"));
        let provider = create_provider(&config).unwrap();
        assert!(matches!(provider, AnyProvider::OpenAi(_)));
    }
}
