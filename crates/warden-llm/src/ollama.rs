use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::models::ModelOptions;

use crate::error::LlmError;
use crate::provider::{GenerationParams, LlmProvider, Message, Role};

const PROVIDER: &str = "ollama";
const DEFAULT_PORT: u16 = 11434;

/// Local Ollama server serving both the chat and the embedding model.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    embedding_model: String,
    params: GenerationParams,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Self {
        let (host, port) = split_base_url(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            embedding_model,
            params: GenerationParams::default(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Confirm the server answers and warn about configured models it has not pulled.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Unreachable`] if the model list cannot be fetched.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        let installed: Vec<String> = self
            .client
            .list_local_models()
            .await
            .map_err(|e| LlmError::Unreachable {
                provider: PROVIDER,
                reason: e.to_string(),
            })?
            .into_iter()
            .map(|m| m.name)
            .collect();

        for wanted in [&self.model, &self.embedding_model] {
            if !is_installed(&installed, wanted) {
                tracing::warn!(model = %wanted, "model not pulled on ollama server");
            }
        }
        Ok(())
    }

    fn options(&self) -> ModelOptions {
        ModelOptions::default()
            .temperature(self.params.temperature)
            .num_predict(i32::try_from(self.params.max_tokens).unwrap_or(i32::MAX))
    }
}

impl LlmProvider for OllamaProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let history = messages.iter().map(to_chat_message).collect();
        let request =
            ChatMessageRequest::new(self.model.clone(), history).options(self.options());

        let reply = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(rejected)?
            .message
            .content;

        if reply.trim().is_empty() {
            return Err(LlmError::EmptyResponse { provider: PROVIDER });
        }
        Ok(reply)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let request =
            GenerateEmbeddingsRequest::new(self.embedding_model.clone(), EmbeddingsInput::from(text));

        self.client
            .generate_embeddings(request)
            .await
            .map_err(rejected)?
            .embeddings
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }
}

fn rejected(e: ollama_rs::error::OllamaError) -> LlmError {
    LlmError::Rejected {
        provider: PROVIDER,
        message: e.to_string(),
    }
}

fn to_chat_message(message: &Message) -> ChatMessage {
    let content = message.content.clone();
    match message.role {
        Role::System => ChatMessage::system(content),
        Role::User => ChatMessage::user(content),
        Role::Assistant => ChatMessage::assistant(content),
    }
}

/// `ollama-rs` takes scheme+host and port separately.
fn split_base_url(base_url: &str) -> (String, u16) {
    let trimmed = base_url.trim_end_matches('/');
    trimmed
        .rsplit_once(':')
        .and_then(|(host, port)| Some((host.to_owned(), port.parse().ok()?)))
        .unwrap_or_else(|| (trimmed.to_owned(), DEFAULT_PORT))
}

/// Ollama lists models with an explicit tag, so an untagged name means `:latest`.
fn is_installed(installed: &[String], wanted: &str) -> bool {
    installed.iter().any(|name| {
        name == wanted
            || (!wanted.contains(':') && name.strip_suffix(":latest") == Some(wanted))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_with_port() {
        assert_eq!(
            split_base_url("http://localhost:11434"),
            ("http://localhost".to_owned(), 11434)
        );
        assert_eq!(
            split_base_url("http://gpu-box:9000/"),
            ("http://gpu-box".to_owned(), 9000)
        );
    }

    #[test]
    fn base_url_without_port_uses_default() {
        assert_eq!(
            split_base_url("http://ollama.internal"),
            ("http://ollama.internal".to_owned(), DEFAULT_PORT)
        );
    }

    #[test]
    fn untagged_model_matches_latest() {
        let installed = vec!["nomic-embed-text:latest".to_owned(), "llama3.1:8b".to_owned()];
        assert!(is_installed(&installed, "nomic-embed-text"));
        assert!(is_installed(&installed, "llama3.1:8b"));
        assert!(!is_installed(&installed, "llama3.1"));
        assert!(!is_installed(&installed, "llama3.1:70b"));
    }

    #[test]
    fn with_params_overrides_defaults() {
        let p = OllamaProvider::new("http://localhost:11434", "m".into(), "e".into()).with_params(
            GenerationParams {
                temperature: 0.1,
                max_tokens: 64,
            },
        );
        assert_eq!(p.name(), "ollama");
        assert!(p.supports_embeddings());
        assert_eq!(p.params.max_tokens, 64);
    }

    #[tokio::test]
    async fn unreachable_server_fails_health_check() {
        let p = OllamaProvider::new("http://127.0.0.1:1", "m".into(), "e".into());
        let err = p.health_check().await.unwrap_err();
        assert!(matches!(err, LlmError::Unreachable { provider: "ollama", .. }));
        assert!(p.chat(&[Message::user("hi")]).await.is_err());
    }
}
