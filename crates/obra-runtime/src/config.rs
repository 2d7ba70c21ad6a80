//! Pipeline configuration.
//!
//! Every field has a default, so an empty YAML file is a valid
//! configuration. Durations are written the human way (`"90s"`,
//! `"2m"`).
//!
//! ```yaml
//! extraction_candidates: [gpt-4o, gpt-4o-mini, o3-mini, o1]
//! analysis_candidates: [gpt-4o, gpt-4o-mini, o3-mini]
//! request_timeout: 2m
//! ping_timeout: 20s
//! validate_extraction: false
//! intermediate_path: salida/contrato_intermedio.json
//! output_path: salida/resultado_final.json
//! provider_type: openai
//! provider:
//!   base_url: https://api.openai.com/v1
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for one pipeline run.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Models for the extraction stage, most capable first
    pub extraction_candidates: Vec<String>,

    /// Models for the analysis stage, most capable first
    pub analysis_candidates: Vec<String>,

    /// Transport timeout for stage calls
    #[serde(with = "duration_str")]
    pub request_timeout: Duration,

    /// Transport timeout for availability pings
    #[serde(with = "duration_str")]
    pub ping_timeout: Duration,

    /// Cap on generated tokens per stage call
    pub max_tokens: Option<u32>,

    /// Check the extraction record against its JSON Schema
    pub validate_extraction: bool,

    /// Where to write the contract record right after extraction
    pub intermediate_path: Option<PathBuf>,

    /// Where to write the reconciled analysis record
    pub output_path: Option<PathBuf>,

    /// Provider registry key
    pub provider_type: String,

    /// Provider settings (`api_key`, `base_url`)
    pub provider: JsonValue,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extraction_candidates: ["gpt-4o", "gpt-4o-mini", "o3-mini", "o1"]
                .map(String::from)
                .to_vec(),
            analysis_candidates: ["gpt-4o", "gpt-4o-mini", "o3-mini"]
                .map(String::from)
                .to_vec(),
            request_timeout: Duration::from_secs(120),
            ping_timeout: Duration::from_secs(20),
            max_tokens: None,
            validate_extraction: false,
            intermediate_path: None,
            output_path: None,
            provider_type: "openai".to_string(),
            provider: JsonValue::Object(Default::default()),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() || self.ping_timeout.is_zero() {
            return Err(ConfigError::Invalid("timeouts must be non-zero".to_string()));
        }
        if self.max_tokens == Some(0) {
            return Err(ConfigError::Invalid("max_tokens must be positive".to_string()));
        }
        if !(self.provider.is_object() || self.provider.is_null()) {
            return Err(ConfigError::Invalid(
                "provider settings must be a mapping".to_string(),
            ));
        }
        Ok(())
    }
}

// Provider settings may hold an API key, so only their keys are shown.
impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let provider_keys: Vec<&str> = self
            .provider
            .as_object()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default();

        f.debug_struct("PipelineConfig")
            .field("extraction_candidates", &self.extraction_candidates)
            .field("analysis_candidates", &self.analysis_candidates)
            .field("request_timeout", &self.request_timeout)
            .field("ping_timeout", &self.ping_timeout)
            .field("max_tokens", &self.max_tokens)
            .field("validate_extraction", &self.validate_extraction)
            .field("intermediate_path", &self.intermediate_path)
            .field("output_path", &self.output_path)
            .field("provider_type", &self.provider_type)
            .field("provider", &provider_keys)
            .finish()
    }
}

mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
