//! Chat-completion clients used by the analysis pipeline
//!
//! Provides an `LlmBackend` trait with one HTTP implementation that speaks two
//! dialects of the chat-completions API:
//! - **Azure OpenAI**: `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=...`
//!   authenticated with an `api-key` header
//! - **OpenAI-compatible**: `{endpoint}/v1/chat/completions` with an optional
//!   bearer token (hosted OpenAI, Ollama, vLLM, llama.cpp server, ...)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::LlmConfig;

// ============================================================================
// LlmBackend trait
// ============================================================================

/// Abstraction over chat-completion providers.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Send a single user prompt and return the assistant's text reply.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Model or deployment name, recorded alongside each analysis.
    fn model(&self) -> &str;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Model returned an empty reply")]
    EmptyResponse,

    #[error("Model reply is not a valid analysis: {0}")]
    InvalidResponse(String),

    #[error("Missing API key (set {env_var})")]
    MissingApiKey { env_var: String },

    #[error("Missing endpoint for provider {provider}")]
    MissingEndpoint { provider: String },

    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),

    #[error("All {attempts} retry attempts failed: {last_error}")]
    RetryExhausted { attempts: usize, last_error: String },
}

// ============================================================================
// Config types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Azure,
    OpenAi,
}

impl Provider {
    pub fn parse(s: &str) -> Result<Self, LlmError> {
        match s {
            "azure" => Ok(Provider::Azure),
            "openai" => Ok(Provider::OpenAi),
            other => Err(LlmError::UnknownProvider(other.to_string())),
        }
    }
}

/// Resolved client configuration (API key already read from the environment).
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub provider: Provider,
    pub endpoint: String,
    pub model: String,
    pub api_version: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl ChatClientConfig {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            provider: Provider::parse(&config.provider)?,
            endpoint: config.resolved_endpoint(),
            model: config.model.clone(),
            api_version: config.api_version.clone(),
            api_key: config.api_key(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_seconds),
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }
}

/// Create the configured backend. Fails fast on missing endpoint or key.
pub fn create_backend(config: &LlmConfig) -> Result<Box<dyn LlmBackend>, LlmError> {
    let resolved = ChatClientConfig::from_config(config)?;
    if resolved.provider == Provider::Azure && resolved.api_key.is_none() {
        return Err(LlmError::MissingApiKey {
            env_var: config.api_key_env.clone(),
        });
    }
    Ok(Box::new(ChatCompletionClient::new(resolved)?))
}

// ============================================================================
// Chat-completions API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// ChatCompletionClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: Client,
    config: ChatClientConfig,
}

impl ChatCompletionClient {
    pub fn new(config: ChatClientConfig) -> Result<Self, LlmError> {
        if config.endpoint.is_empty() {
            return Err(LlmError::MissingEndpoint {
                provider: format!("{:?}", config.provider).to_lowercase(),
            });
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        let base = self.config.endpoint.trim_end_matches('/');
        match self.config.provider {
            Provider::Azure => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                base, self.config.model, self.config.api_version
            ),
            Provider::OpenAi => format!("{}/v1/chat/completions", base),
        }
    }

    /// Complete with retries. Every attempt failure is logged; exhaustion
    /// surfaces as `RetryExhausted` carrying the last error.
    pub async fn complete_with_retry(&self, prompt: &str) -> Result<String, LlmError> {
        let attempts = self.config.max_retries.max(1);
        // First attempt is immediate; the strategy yields the delays between retries
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms.max(1))
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(attempts - 1);

        let result = Retry::spawn(retry_strategy, || async {
            self.complete_once(prompt).await.map_err(|e| {
                tracing::warn!(backend = self.name(), error = %e, "LLM request failed");
                e
            })
        })
        .await;

        match result {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::error!(
                    attempts,
                    error = %e,
                    "All LLM retry attempts failed"
                );
                Err(LlmError::RetryExhausted {
                    attempts,
                    last_error: e.to_string(),
                })
            }
        }
    }

    async fn complete_once(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            // Azure routes by deployment in the URL; the body model field is ignored there
            model: match self.config.provider {
                Provider::Azure => None,
                Provider::OpenAi => Some(self.config.model.as_str()),
            },
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        let mut builder = self.client.post(self.url()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = match self.config.provider {
                Provider::Azure => builder.header("api-key", key),
                Provider::OpenAi => builder.bearer_auth(key),
            };
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), message = %message, "LLM API error");

            return Err(LlmError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response.json().await?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl LlmBackend for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.complete_with_retry(prompt).await
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn name(&self) -> &str {
        match self.config.provider {
            Provider::Azure => "azure",
            Provider::OpenAi => "openai",
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(provider: Provider, endpoint: String) -> ChatClientConfig {
        ChatClientConfig {
            provider,
            endpoint,
            model: "gpt-4.1".to_string(),
            api_version: "2024-12-01-preview".to_string(),
            api_key: Some("test-api-key".to_string()),
            temperature: 0.0,
            timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_delay_ms: 10,
        }
    }

    fn mock_chat_response(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": content}}
            ]
        })
    }

    #[tokio::test]
    async fn test_azure_request_shape() {
        let mock_server = MockServer::start().await;
        let client =
            ChatCompletionClient::new(test_config(Provider::Azure, mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt-4.1/chat/completions"))
            .and(query_param("api-version", "2024-12-01-preview"))
            .and(header("api-key", "test-api-key"))
            .and(body_json(serde_json::json!({
                "messages": [{"role": "user", "content": "analyze this"}],
                "temperature": 0.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_chat_response("{}")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let reply = client.complete("analyze this").await.unwrap();
        assert_eq!(reply, "{}");
        assert_eq!(client.name(), "azure");
        assert_eq!(client.model(), "gpt-4.1");
    }

    #[tokio::test]
    async fn test_openai_request_uses_bearer_and_model() {
        let mock_server = MockServer::start().await;
        let client =
            ChatCompletionClient::new(test_config(Provider::OpenAi, mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(body_json(serde_json::json!({
                "model": "gpt-4.1",
                "messages": [{"role": "user", "content": "hi"}],
                "temperature": 0.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_chat_response("ok")))
            .mount(&mock_server)
            .await;

        assert_eq!(client.complete("hi").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_retries_on_429_then_succeeds() {
        let mock_server = MockServer::start().await;
        let client =
            ChatCompletionClient::new(test_config(Provider::Azure, mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"code": "429", "message": "Rate limit exceeded"}
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_chat_response("done")))
            .mount(&mock_server)
            .await;

        assert_eq!(client.complete("x").await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_retry_exhausted_after_configured_attempts() {
        let mock_server = MockServer::start().await;
        let client =
            ChatCompletionClient::new(test_config(Provider::Azure, mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": {"message": "Internal server error"}
            })))
            .expect(3)
            .mount(&mock_server)
            .await;

        match client.complete("x").await {
            Err(LlmError::RetryExhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("Internal server error"), "{last_error}");
            }
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_choice_is_an_error() {
        let mock_server = MockServer::start().await;
        let mut config = test_config(Provider::OpenAi, mock_server.uri());
        config.max_retries = 1;
        let client = ChatCompletionClient::new(config).unwrap();

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&mock_server)
            .await;

        let err = client.complete("x").await.unwrap_err();
        assert!(err.to_string().contains("empty reply"), "{err}");
    }

    #[test]
    fn test_missing_endpoint_rejected() {
        let result = ChatCompletionClient::new(test_config(Provider::Azure, String::new()));
        assert!(matches!(result, Err(LlmError::MissingEndpoint { .. })));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "gemini".to_string(),
            endpoint: "http://localhost".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            create_backend(&config),
            Err(LlmError::UnknownProvider(p)) if p == "gemini"
        ));
    }

    #[test]
    fn test_azure_requires_api_key() {
        let config = LlmConfig {
            provider: "azure".to_string(),
            endpoint: "http://localhost".to_string(),
            api_key_env: "RCA_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            create_backend(&config),
            Err(LlmError::MissingApiKey { .. })
        ));
    }
}
