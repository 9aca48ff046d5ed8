//! OpenAI-compatible chat completions provider.
//!
//! Requests a strict JSON object from `{baseUrl}/chat/completions`. Logs the
//! model, latency and response size, never the API key or the full content.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::ProviderConfig;
use crate::error::{GeneratorError, ProviderError, ProviderErrorKind};
use crate::prompt::PromptPayload;
use crate::provider::ContentProvider;

const CLIENT_USER_AGENT: &str = concat!("lingo/", env!("CARGO_PKG_VERSION"));

/// Chat completions client for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiProvider {
    /// Creates a provider with an explicit API key.
    ///
    /// The per-attempt timeout is enforced by the generator, not the client.
    pub fn new(
        config: &ProviderConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            GeneratorError::config_validation(
                format!("cannot build HTTP client: {e}"),
                "Check the TLS setup of this machine",
            )
        })?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Creates a provider reading the API key from `config.api_key_env`.
    pub fn from_env(config: &ProviderConfig) -> Result<Self, GeneratorError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            GeneratorError::config_validation(
                format!("environment variable {} is not set", config.api_key_env),
                format!(
                    "Export {} with your API key, or set provider.apiKeyEnv in lingo.json",
                    config.api_key_env
                ),
            )
        })?;
        Self::new(config, api_key)
    }

    /// Returns the chat completions URL.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ContentProvider for OpenAiProvider {
    #[instrument(
        level = "info",
        skip(self, payload),
        fields(model = %self.model, topic = %payload.brief.topic)
    )]
    async fn generate_content(&self, payload: &PromptPayload) -> Result<String, ProviderError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessageReq {
                    role: "system".into(),
                    content: payload.system.clone(),
                },
                ChatMessageReq {
                    role: "user".into(),
                    content: payload.user.clone(),
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                r#type: "json_object".into(),
            },
        };

        let started = Instant::now();
        let res = self
            .client
            .post(self.endpoint())
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let message = extract_openai_error(&body).unwrap_or(body);
            return Err(ProviderError::new(
                classify_status(status),
                format!("HTTP {status}: {message}"),
            ));
        }

        let body: ChatCompletionResponse = res.json().await.map_err(|e| {
            ProviderError::new(ProviderErrorKind::Other, format!("unreadable response: {e}"))
        })?;
        if let Some(usage) = &body.usage {
            debug!(
                prompt_tokens = ?usage.prompt_tokens,
                completion_tokens = ?usage.completion_tokens,
                total_tokens = ?usage.total_tokens,
                "Provider usage"
            );
        }

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ProviderError::new(
                ProviderErrorKind::EmptyResponse,
                "response contained no message content",
            ));
        }

        info!(
            latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            response_len = text.len(),
            "Provider call completed"
        );
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Maps an HTTP status to a provider error kind.
#[must_use]
pub fn classify_status(status: StatusCode) -> ProviderErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderErrorKind::Authentication,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED => {
            ProviderErrorKind::RateLimit
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderErrorKind::Timeout,
        s if s.is_server_error() => ProviderErrorKind::Server,
        _ => ProviderErrorKind::Other,
    }
}

fn classify_transport(err: &reqwest::Error) -> ProviderError {
    let kind = if err.is_timeout() {
        ProviderErrorKind::Timeout
    } else if err.is_connect() || err.is_request() {
        ProviderErrorKind::Network
    } else {
        ProviderErrorKind::Other
    };
    ProviderError::new(kind, err.to_string())
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessageReq>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessageReq {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    r#type: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResp,
}

#[derive(Deserialize)]
struct ChatMessageResp {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
    #[serde(default)]
    total_tokens: Option<u32>,
}

/// Pulls `error.message` out of an OpenAI-style error body.
fn extract_openai_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorWrap {
        error: ErrorObj,
    }
    #[derive(Deserialize)]
    struct ErrorObj {
        message: String,
    }
    serde_json::from_str::<ErrorWrap>(body)
        .ok()
        .map(|w| w.error.message)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED), ProviderErrorKind::Authentication);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), ProviderErrorKind::RateLimit);
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), ProviderErrorKind::Server);
        assert_eq!(classify_status(StatusCode::GATEWAY_TIMEOUT), ProviderErrorKind::Timeout);
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), ProviderErrorKind::Other);
    }

    #[test]
    fn test_extract_openai_error() {
        let body = json!({
            "error": {
                "message": "Incorrect API key provided",
                "type": "invalid_request_error"
            }
        })
        .to_string();
        assert_eq!(
            extract_openai_error(&body).as_deref(),
            Some("Incorrect API key provided")
        );
        assert_eq!(extract_openai_error("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let config = ProviderConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..ProviderConfig::default()
        };
        let provider = OpenAiProvider::new(&config, "sk-test").unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(provider.name(), config.model);
        assert!(!format!("{provider:?}").contains("sk-test"));
    }

    #[test]
    fn test_from_env_requires_key() {
        let config = ProviderConfig {
            api_key_env: "LINGO_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ProviderConfig::default()
        };
        let err = OpenAiProvider::from_env(&config).unwrap_err();
        assert!(err.to_string().contains("LINGO_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatCompletionRequest {
            model: "m".into(),
            messages: vec![ChatMessageReq {
                role: "user".into(),
                content: "hi".into(),
            }],
            temperature: 0.5,
            response_format: ResponseFormat {
                r#type: "json_object".into(),
            },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""response_format":{"type":"json_object"}"#));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let config = ProviderConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..ProviderConfig::default()
        };
        let provider = OpenAiProvider::new(&config, "sk-test").unwrap();
        let payload = PromptPayload::for_brief(&crate::prompt::LessonBrief::new("Travel"));
        let err = provider.generate_content(&payload).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Network);
    }
}
