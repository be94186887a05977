use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{GenerationParams, LlmProvider, Message};

const PROVIDER: &str = "openai";

/// Client for `/chat/completions` and `/embeddings` on OpenAI or any server
/// that speaks the same protocol (Groq, vLLM, LM Studio, ...).
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: Option<String>,
    params: GenerationParams,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl OpenAiProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        embedding_model: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: crate::http::default_client(request_timeout)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model,
            embedding_model,
            params: GenerationParams::default(),
        })
    }

    #[must_use]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// POST `body` to `{base_url}/{path}` and decode a successful reply.
    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, LlmError> {
        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let payload = response.text().await?;
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            tracing::error!(path, status = status.as_u16(), body = %payload, "openai request failed");
            return Err(LlmError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }
        Ok(serde_json::from_str(&payload)?)
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let body = CompletionBody {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
        };
        let reply: CompletionReply = self.post("chat/completions", &body).await?;

        if let Some(usage) = &reply.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion usage"
            );
        }

        reply
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported { provider: PROVIDER })?;

        let reply: EmbeddingReply = self
            .post("embeddings", &EmbeddingBody { input: text, model })
            .await?;
        reply
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            role: message.role.as_str(),
            content: &message.content,
        }
    }
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionReply {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Serialize)]
struct EmbeddingBody<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingReply {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(embedding_model: Option<&str>) -> OpenAiProvider {
        OpenAiProvider::new(
            "sk-test-key".into(),
            "https://api.groq.com/openai/v1/".into(),
            "llama-3.1-8b-instant".into(),
            embedding_model.map(str::to_owned),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        assert_eq!(provider(None).base_url, "https://api.groq.com/openai/v1");
    }

    #[test]
    fn debug_hides_api_key() {
        let debug = format!("{:?}", provider(None));
        assert!(!debug.contains("sk-test-key"));
        assert!(debug.contains("llama-3.1-8b-instant"));
    }

    #[test]
    fn embeddings_need_a_model() {
        assert!(provider(Some("text-embedding-3-small")).supports_embeddings());
        assert!(!provider(None).supports_embeddings());
    }

    #[test]
    fn completion_body_carries_sampling_params() {
        let messages = [Message::system("rules"), Message::user("hello")];
        let body = CompletionBody {
            model: "m",
            messages: messages.iter().map(WireMessage::from).collect(),
            max_tokens: 1024,
            temperature: 0.2,
        };
        let json: serde_json::Value = serde_json::to_value(&body).unwrap();
        assert_eq!(json["max_tokens"], 1024);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hello");
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn completion_reply_tolerates_null_content() {
        let reply: CompletionReply = serde_json::from_str(
            r#"{"choices":[{"message":{"content":null}},{"message":{"content":"second"}}]}"#,
        )
        .unwrap();
        let first = reply.choices.into_iter().find_map(|c| c.message.content);
        assert_eq!(first.as_deref(), Some("second"));
    }

    #[test]
    fn embedding_reply_parses() {
        let reply: EmbeddingReply =
            serde_json::from_str(r#"{"data":[{"embedding":[0.5,-0.5]}]}"#).unwrap();
        assert_eq!(reply.data[0].embedding, vec![0.5, -0.5]);
    }

    #[tokio::test]
    async fn embed_without_model_is_unsupported() {
        let err = provider(None).embed("x").await.unwrap_err();
        assert!(matches!(err, LlmError::EmbedUnsupported { .. }));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        let p = OpenAiProvider::new(
            "key".into(),
            "http://127.0.0.1:1".into(),
            "model".into(),
            None,
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(p.chat(&[Message::user("test")]).await.is_err());
    }
}
