//! OpenAI chat-completions provider.
//!
//! Also works with any endpoint that speaks the same protocol
//! (`base_url` in the provider settings).
//!
//! Newer reasoning models reject `max_tokens` and older ones reject
//! `max_completion_tokens`. Requests go out with
//! `max_completion_tokens` first and are repeated once with
//! `max_tokens` when the API names the parameter as unsupported.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    ResponseFormat, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable name for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat-completions provider.
pub struct OpenAiProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiProvider {
    /// Create a provider with an explicit key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_credential(
            ApiCredential::new(api_key, CredentialSource::Programmatic, "OpenAI API key"),
            DEFAULT_BASE_URL.to_string(),
        )
    }

    /// Create from settings: `api_key` (falls back to `OPENAI_API_KEY`)
    /// and optional `base_url`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            OPENAI_API_KEY_ENV,
            "OpenAI API key",
        )?;

        let base_url = config["base_url"]
            .as_str()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Self::with_credential(credential, base_url)
    }

    fn with_credential(credential: ApiCredential, base_url: String) -> Result<Self, ProviderError> {
        if credential.is_empty() {
            return Err(ProviderError::NotConfigured(format!(
                "OpenAI API key is empty ({})",
                credential.source()
            )));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;
        Ok(Self {
            credential,
            base_url,
            client,
        })
    }

    async fn post(
        &self,
        request: &ChatRequest<'_>,
        timeout: Duration,
    ) -> Result<ChatResponse, ProviderError> {
        // Expose the key only while building the header
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if status == 401 {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

/// Which request field carries the output token cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenParam {
    MaxCompletionTokens,
    MaxTokens,
}

impl TokenParam {
    fn field(self) -> &'static str {
        match self {
            TokenParam::MaxCompletionTokens => "max_completion_tokens",
            TokenParam::MaxTokens => "max_tokens",
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatBody>,
}

#[derive(Debug, Serialize)]
struct ResponseFormatBody {
    #[serde(rename = "type")]
    type_: &'static str,
}

impl<'a> ChatRequest<'a> {
    fn new(messages: &'a [ChatMessage], config: &'a CompletionConfig, param: TokenParam) -> Self {
        let (max_completion_tokens, max_tokens) = match param {
            TokenParam::MaxCompletionTokens => (config.max_tokens, None),
            TokenParam::MaxTokens => (None, config.max_tokens),
        };
        Self {
            model: &config.model,
            messages,
            temperature: config.temperature,
            max_completion_tokens,
            max_tokens,
            response_format: match config.response_format {
                ResponseFormat::Text => None,
                ResponseFormat::JsonObject => Some(ResponseFormatBody {
                    type_: "json_object",
                }),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// True when a 400 complains about the token-cap field we sent.
fn rejects_token_param(error: &ProviderError, param: TokenParam) -> bool {
    matches!(
        error,
        ProviderError::ApiError { status: 400, message } if message.contains(param.field())
    )
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let first = ChatRequest::new(&messages, config, TokenParam::MaxCompletionTokens);
        let body = match self.post(&first, config.timeout).await {
            Err(e)
                if config.max_tokens.is_some()
                    && rejects_token_param(&e, TokenParam::MaxCompletionTokens) =>
            {
                tracing::debug!(
                    model = %config.model,
                    "max_completion_tokens rejected, repeating with max_tokens"
                );
                let fallback = ChatRequest::new(&messages, config, TokenParam::MaxTokens);
                self.post(&fallback, config.timeout).await?
            }
            other => other?,
        };

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("response has no choices".to_string()))?;
        let usage = body.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
            model: body.model,
            stop_reason: choice.finish_reason,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Factory for creating OpenAI providers from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "sk-...",                      // Optional, falls back to OPENAI_API_KEY env
///   "base_url": "https://api.openai.com/v1"   // Optional, compatible endpoint
/// }
/// ```
pub struct OpenAiProviderFactory;

impl ProviderFactory for OpenAiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "openai"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(OpenAiProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", OPENAI_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "OpenAI API key required: set 'api_key' in config or {} env",
                OPENAI_API_KEY_ENV
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }
}
