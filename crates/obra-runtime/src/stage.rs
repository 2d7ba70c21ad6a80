//! One model call per pipeline stage.
//!
//! A stage sends a single user message, asks for a JSON object back,
//! and reports how long the call took. The runner does not retry: a
//! transport or API failure fails the stage.

use std::sync::Arc;
use std::time::{Duration, Instant};

use obra_core::{coerce_object, Stage};
use serde_json::{Map, Value as JsonValue};

use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, TokenUsage};
use crate::PipelineError;

/// Raw result of a stage call.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub stage: Stage,
    /// Model that served the call
    pub model: String,
    /// Response text exactly as returned
    pub text: String,
    pub elapsed: Duration,
    pub usage: TokenUsage,
}

/// Runs stage prompts against a provider.
pub struct StageRunner {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
    max_tokens: Option<u32>,
}

impl StageRunner {
    pub fn new(provider: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            max_tokens: None,
        }
    }

    /// Cap the number of generated tokens per call.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Send `prompt` to `model` and return the response text.
    pub async fn run(
        &self,
        stage: Stage,
        model: &str,
        prompt: &str,
    ) -> Result<StageOutput, PipelineError> {
        let config = CompletionConfig::json(model, self.timeout).with_max_tokens(self.max_tokens);

        tracing::info!(
            stage = %stage,
            model = %model,
            prompt_tokens_est = self.provider.estimate_tokens(prompt),
            "Calling model"
        );

        let start = Instant::now();
        let response = self
            .provider
            .complete(vec![ChatMessage::user(prompt)], &config)
            .await
            .map_err(|source| PipelineError::Stage {
                stage,
                model: model.to_string(),
                source,
            })?;
        let elapsed = start.elapsed();

        tracing::info!(
            stage = %stage,
            model = %response.model,
            elapsed_ms = elapsed.as_millis() as u64,
            tokens = response.usage.total(),
            "Stage call finished"
        );

        Ok(StageOutput {
            stage,
            model: model.to_string(),
            text: response.content,
            elapsed,
            usage: response.usage,
        })
    }

    /// Like [`run`](Self::run), then coerce the text into a JSON object.
    pub async fn run_json(
        &self,
        stage: Stage,
        model: &str,
        prompt: &str,
    ) -> Result<(StageOutput, Map<String, JsonValue>), PipelineError> {
        let output = self.run(stage, model, prompt).await?;
        let object = coerce_object(output.text.as_str(), stage)?;
        Ok((output, object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CompletionResponse, ProviderError, ResponseFormat};
    use async_trait::async_trait;
    use obra_core::RecordError;
    use std::sync::Mutex;

    struct CannedProvider {
        reply: Result<String, ()>,
        seen: Mutex<Vec<(CompletionConfig, Vec<ChatMessage>)>>,
    }

    impl CannedProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.seen.lock().unwrap().push((config.clone(), messages));
            match &self.reply {
                Ok(text) => Ok(CompletionResponse {
                    content: text.clone(),
                    usage: TokenUsage {
                        prompt_tokens: 40,
                        completion_tokens: 10,
                    },
                    model: config.model.clone(),
                    stop_reason: Some("stop".to_string()),
                }),
                Err(()) => Err(ProviderError::RateLimited { retry_after: None }),
            }
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn test_run_sends_single_json_request() {
        let provider = Arc::new(CannedProvider::replying(r#"{"proyecto": {}}"#));
        let runner = StageRunner::new(provider.clone(), Duration::from_secs(30))
            .with_max_tokens(Some(4096));

        let output = runner.run(Stage::Extraction, "gpt-4o", "PROMPT").await.unwrap();

        assert_eq!(output.text, r#"{"proyecto": {}}"#);
        assert_eq!(output.model, "gpt-4o");
        assert_eq!(output.usage.total(), 50);

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (config, messages) = &seen[0];
        assert_eq!(config.response_format, ResponseFormat::JsonObject);
        assert_eq!(config.temperature, Some(0.0));
        assert_eq!(config.max_tokens, Some(4096));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "PROMPT");
    }

    #[tokio::test]
    async fn test_run_json_coerces_object() {
        let provider = Arc::new(CannedProvider::replying(r#"{"partidas": []}"#));
        let runner = StageRunner::new(provider, Duration::from_secs(30));

        let (_, object) = runner.run_json(Stage::Analysis, "gpt-4o", "p").await.unwrap();
        assert!(object["partidas"].is_array());
    }

    #[tokio::test]
    async fn test_run_json_rejects_invalid_text() {
        let provider = Arc::new(CannedProvider::replying("Claro, aquí está el JSON"));
        let runner = StageRunner::new(provider, Duration::from_secs(30));

        let result = runner.run_json(Stage::Extraction, "gpt-4o", "p").await;
        assert!(matches!(
            result,
            Err(PipelineError::Record(RecordError::InvalidJson {
                stage: Stage::Extraction,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_names_stage() {
        let provider = Arc::new(CannedProvider::failing());
        let runner = StageRunner::new(provider, Duration::from_secs(30));

        match runner.run(Stage::Analysis, "o3-mini", "p").await {
            Err(PipelineError::Stage { stage, model, source }) => {
                assert_eq!(stage, Stage::Analysis);
                assert_eq!(model, "o3-mini");
                assert!(matches!(source, ProviderError::RateLimited { .. }));
            }
            other => panic!("Expected stage error, got {:?}", other),
        }
    }
}
