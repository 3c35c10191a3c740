//! Completion client for OpenAI-compatible chat endpoints.
//!
//! One request, one response: failures are returned to the caller and never
//! retried here. Each caller decides its own fallback.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

use crate::config::CompletionConfig;
use crate::error::PolidebateError;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A role-tagged message sent to the completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Anything that can turn a message list into a single text completion.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, PolidebateError>;
}

/// [`CompletionClient`] backed by `async-openai`.
pub struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCompletion {
    /// Build a client with the configured endpoint, key, model and timeout.
    pub fn new(config: &CompletionConfig) -> Result<Self, PolidebateError> {
        if config.model.trim().is_empty() {
            return Err(PolidebateError::Config("missing completion model".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                PolidebateError::Config(format!("Failed to create HTTP client: {}", e))
            })?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(config.api_base.trim_end_matches('/'));

        // Rate-limited and 5xx replies fail on the first attempt.
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Ok(Self {
            client: Client::with_config(openai_config)
                .with_http_client(http_client)
                .with_backoff(no_retry),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletion {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, PolidebateError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(temperature)
            .messages(messages.iter().map(to_request_message).collect::<Vec<_>>())
            .build()?;

        debug!(
            model = %self.model,
            messages = messages.len(),
            temperature,
            "sending completion request"
        );

        let response = self.client.chat().create(request).await?;
        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(strip_reasoning(&content))
    }
}

fn to_request_message(message: &ChatMessage) -> ChatCompletionRequestMessage {
    let content = message.content.clone();
    match message.role {
        Role::System => {
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: content.into(),
                name: None,
            })
        }
        Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: content.into(),
            name: None,
        }),
    }
}

/// Remove reasoning blocks some models emit ahead of their answer.
///
/// Only whole `<think>`-style blocks are removed; everything else, including
/// layout, is left for the caller.
pub fn strip_reasoning(response: &str) -> String {
    static REASONING: OnceLock<Option<Regex>> = OnceLock::new();
    let re = REASONING.get_or_init(|| {
        Regex::new(
            r"(?is)<(think|thinking|reasoning|reflection|scratchpad)[^>]*>.*?</(think|thinking|reasoning|reflection|scratchpad)>",
        )
        .ok()
    });

    match re {
        Some(re) => re.replace_all(response, "").trim().to_string(),
        None => response.trim().to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_base: String) -> CompletionConfig {
        CompletionConfig {
            api_base,
            api_key: "sk-test".to_string(),
            model: "test/model".to_string(),
            timeout_secs: 5,
        }
    }

    fn completion_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "test/model",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    fn api_error(message: &str, kind: &str) -> serde_json::Value {
        serde_json::json!({
            "error": { "message": message, "type": kind, "param": null, "code": null }
        })
    }

    #[test]
    fn test_strip_reasoning_removes_think_block() {
        let input = "<think>weighing options</think>\n[\"Trade Policy\"]";
        assert_eq!(strip_reasoning(input), "[\"Trade Policy\"]");
    }

    #[test]
    fn test_strip_reasoning_keeps_plain_text() {
        let input = "```json\n{\"1\": \"Healthcare\"}\n```";
        assert_eq!(strip_reasoning(input), input);
    }

    #[test]
    fn test_new_rejects_blank_model() {
        let mut config = test_config("http://localhost".to_string());
        config.model = "  ".to_string();
        assert!(matches!(
            OpenAiCompletion::new(&config),
            Err(PolidebateError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_body("[\"Elections\"]")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiCompletion::new(&test_config(server.uri())).unwrap();
        let text = client
            .complete(&[ChatMessage::system("sys"), ChatMessage::user("hi")], 0.3)
            .await
            .unwrap();

        assert_eq!(text, "[\"Elections\"]");
    }

    #[tokio::test]
    async fn test_complete_maps_http_failure_to_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(api_error(
                "bad request",
                "invalid_request_error",
            )))
            .mount(&server)
            .await;

        let client = OpenAiCompletion::new(&test_config(server.uri())).unwrap();
        let err = client
            .complete(&[ChatMessage::user("hi")], 0.3)
            .await
            .unwrap_err();

        assert!(matches!(err, PolidebateError::Transport(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(api_error(
                "Rate limit reached",
                "rate_limit_exceeded",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiCompletion::new(&test_config(server.uri())).unwrap();
        let started = std::time::Instant::now();
        let err = client
            .complete(&[ChatMessage::user("hi")], 0.3)
            .await
            .unwrap_err();

        assert!(matches!(err, PolidebateError::Transport(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(api_error("overloaded", "server_error")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiCompletion::new(&test_config(server.uri())).unwrap();
        let err = client
            .complete(&[ChatMessage::user("hi")], 0.3)
            .await
            .unwrap_err();

        assert!(matches!(err, PolidebateError::Transport(_)));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }
}
