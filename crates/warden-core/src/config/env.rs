use super::{Config, Secret};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_storage();
        self.apply_env_overrides_pipeline();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("WARDEN_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid WARDEN_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("WARDEN_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("WARDEN_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("WARDEN_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("WARDEN_OPENAI_API_KEY")
            && !v.is_empty()
        {
            self.secrets.openai_api_key = Some(Secret::new(v));
        }
        if let Ok(v) = std::env::var("WARDEN_EMBEDDING_DIMENSION") {
            if let Ok(dimension) = v.parse::<usize>() {
                self.embedding.dimension = dimension;
            } else {
                tracing::warn!("ignoring invalid WARDEN_EMBEDDING_DIMENSION value: {v}");
            }
        }
        if let Ok(v) = std::env::var("WARDEN_TIMEOUT_LLM") {
            if let Ok(secs) = v.parse::<u64>() {
                self.timeouts.llm_seconds = secs;
            } else {
                tracing::warn!("ignoring invalid WARDEN_TIMEOUT_LLM value: {v}");
            }
        }
    }

    fn apply_env_overrides_storage(&mut self) {
        if let Ok(v) = std::env::var("WARDEN_INDEX_BACKEND") {
            if let Ok(backend) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.index.backend = backend;
            } else {
                tracing::warn!("ignoring invalid WARDEN_INDEX_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("WARDEN_INDEX_SQLITE_PATH") {
            self.index.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("WARDEN_QDRANT_URL") {
            self.index.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("WARDEN_CONVERSATION_BACKEND") {
            if let Ok(backend) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.conversation.backend = backend;
            } else {
                tracing::warn!("ignoring invalid WARDEN_CONVERSATION_BACKEND value: {v}");
            }
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Ok(v) = std::env::var("WARDEN_CHUNK_SIZE") {
            if let Ok(size) = v.parse::<usize>() {
                self.chunking.chunk_size = size;
            } else {
                tracing::warn!("ignoring invalid WARDEN_CHUNK_SIZE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("WARDEN_CHUNK_OVERLAP") {
            if let Ok(overlap) = v.parse::<usize>() {
                self.chunking.chunk_overlap = overlap;
            } else {
                tracing::warn!("ignoring invalid WARDEN_CHUNK_OVERLAP value: {v}");
            }
        }
        if let Ok(v) = std::env::var("WARDEN_RETRIEVAL_TOP_K") {
            if let Ok(k) = v.parse::<usize>() {
                self.retrieval.top_k = k;
            } else {
                tracing::warn!("ignoring invalid WARDEN_RETRIEVAL_TOP_K value: {v}");
            }
        }
        if let Ok(v) = std::env::var("WARDEN_SOURCE_DIR") {
            self.ingestion.source_dir = v;
        }
    }
}
