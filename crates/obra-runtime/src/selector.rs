//! First-available model among ordered candidates.
//!
//! Each candidate is pinged with a one-token completion. The first one
//! that answers is used for the whole stage; later candidates are never
//! contacted. Ping failures of any kind (unknown model, missing access,
//! rate limit) only move on to the next candidate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::providers::{ChatMessage, CompletionConfig, LlmProvider};
use crate::PipelineError;

const PING_PROMPT: &str = "ok";

/// Picks the first candidate model the provider accepts.
pub struct ModelSelector {
    provider: Arc<dyn LlmProvider>,
    ping_timeout: Duration,
}

impl ModelSelector {
    pub fn new(provider: Arc<dyn LlmProvider>, ping_timeout: Duration) -> Self {
        Self {
            provider,
            ping_timeout,
        }
    }

    /// Ping `candidates` in order and return the first that answers.
    ///
    /// Fails with [`PipelineError::NoAvailableModel`] when none does,
    /// including when the list is empty.
    pub async fn select(&self, candidates: &[String]) -> Result<String, PipelineError> {
        let start = Instant::now();
        let mut last_error = "no candidates configured".to_string();

        for model in candidates {
            let config = CompletionConfig::ping(model.as_str(), self.ping_timeout);
            match self
                .provider
                .complete(vec![ChatMessage::user(PING_PROMPT)], &config)
                .await
            {
                Ok(_) => {
                    tracing::info!(
                        provider = self.provider.name(),
                        model = %model,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Model selected"
                    );
                    return Ok(model.clone());
                }
                Err(e) => {
                    tracing::debug!(model = %model, error = %e, "Model ping failed");
                    last_error = format!("{}: {}", model, e);
                }
            }
        }

        tracing::warn!(candidates = ?candidates, "No candidate model is available");
        Err(PipelineError::NoAvailableModel {
            candidates: candidates.to_vec(),
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CompletionResponse, ProviderError, TokenUsage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Accepts only the listed models and records every ping.
    struct GatedProvider {
        accepted: Vec<&'static str>,
        pings: Mutex<Vec<(String, Option<u32>, String)>>,
    }

    impl GatedProvider {
        fn new(accepted: Vec<&'static str>) -> Self {
            Self {
                accepted,
                pings: Mutex::new(Vec::new()),
            }
        }

        fn pinged_models(&self) -> Vec<String> {
            self.pings.lock().unwrap().iter().map(|p| p.0.clone()).collect()
        }
    }

    #[async_trait]
    impl LlmProvider for GatedProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.pings.lock().unwrap().push((
                config.model.clone(),
                config.max_tokens,
                messages[0].content.clone(),
            ));

            if self.accepted.contains(&config.model.as_str()) {
                Ok(CompletionResponse {
                    content: "ok".to_string(),
                    usage: TokenUsage::default(),
                    model: config.model.clone(),
                    stop_reason: Some("length".to_string()),
                })
            } else {
                Err(ProviderError::ApiError {
                    status: 404,
                    message: format!("The model `{}` does not exist", config.model),
                })
            }
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    fn candidates(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_first_available_wins() {
        let provider = Arc::new(GatedProvider::new(vec!["m2", "m3"]));
        let selector = ModelSelector::new(provider.clone(), Duration::from_secs(5));

        let model = selector.select(&candidates(&["m1", "m2", "m3"])).await.unwrap();

        assert_eq!(model, "m2");
        // m3 is never contacted once m2 answers
        assert_eq!(provider.pinged_models(), vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_ping_is_minimal() {
        let provider = Arc::new(GatedProvider::new(vec!["m1"]));
        let selector = ModelSelector::new(provider.clone(), Duration::from_secs(5));

        selector.select(&candidates(&["m1"])).await.unwrap();

        let pings = provider.pings.lock().unwrap();
        assert_eq!(pings[0], ("m1".to_string(), Some(1), "ok".to_string()));
    }

    #[tokio::test]
    async fn test_none_available() {
        let provider = Arc::new(GatedProvider::new(vec![]));
        let selector = ModelSelector::new(provider.clone(), Duration::from_secs(5));

        match selector.select(&candidates(&["m1", "m2"])).await {
            Err(PipelineError::NoAvailableModel {
                candidates,
                last_error,
            }) => {
                assert_eq!(candidates, vec!["m1", "m2"]);
                assert!(last_error.starts_with("m2:"));
            }
            other => panic!("Expected NoAvailableModel, got {:?}", other),
        }
        assert_eq!(provider.pinged_models().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_candidate_list() {
        let provider = Arc::new(GatedProvider::new(vec!["m1"]));
        let selector = ModelSelector::new(provider.clone(), Duration::from_secs(5));

        let result = selector.select(&[]).await;

        assert!(matches!(result, Err(PipelineError::NoAvailableModel { .. })));
        assert!(provider.pinged_models().is_empty());
    }
}
