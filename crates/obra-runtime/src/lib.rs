//! # obra-runtime
//!
//! Model-backed pipeline that turns a folder of contract PDFs into a
//! reconciled cost-analysis record.
//!
//! The deterministic pieces (records, prompts, validation,
//! reconciliation) live in `obra-core`. This crate adds everything that
//! touches the outside world:
//! - [`providers`]: the LLM seam and the OpenAI implementation
//! - [`selector`]: first-available model among ordered candidates
//! - [`stage`]: one timed model call per stage
//! - [`documents`]: folder of PDFs to joined text
//! - [`pipeline`]: the state machine tying it together
//!
//! ## Example
//!
//! ```rust,ignore
//! use obra_runtime::{PipelineBuilder, PipelineConfig, ProviderRegistry};
//!
//! let config = PipelineConfig::from_yaml_file("obra.yaml")?;
//! let provider = ProviderRegistry::with_defaults().create(&config.provider_type, &config.provider)?;
//! let pipeline = PipelineBuilder::new().provider(provider).config(config).build()?;
//!
//! let outcome = pipeline.run("obras/puente-norte".as_ref()).await?;
//! println!("{:?}", outcome.record.resumen_general);
//! ```

pub mod config;
pub mod documents;
pub mod persist;
pub mod pipeline;
pub mod providers;
pub mod selector;
pub mod stage;

pub use config::{ConfigError, PipelineConfig};
pub use documents::{DocumentReader, PdfFolderReader};
pub use pipeline::{
    Pipeline, PipelineBuilder, PipelineFailure, PipelineOutcome, PipelineRun, PipelineState,
    StageTimings,
};
pub use providers::{LlmProvider, ProviderError, ProviderRegistry};
pub use selector::ModelSelector;
pub use stage::{StageOutput, StageRunner};

use obra_core::{RecordError, Stage};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Folder not found: {}", path.display())]
    FolderNotFound { path: PathBuf },

    #[error("No PDF documents with extractable text in {}", path.display())]
    NoEligibleDocuments { path: PathBuf },

    #[error("Failed to read document {}: {message}", path.display())]
    DocumentRead { path: PathBuf, message: String },

    #[error("No available model among {candidates:?} (last error: {last_error})")]
    NoAvailableModel {
        candidates: Vec<String>,
        last_error: String,
    },

    #[error("{stage} stage call to {model} failed: {source}")]
    Stage {
        stage: Stage,
        model: String,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("Failed to write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid pipeline transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },

    #[error("Pipeline not configured: {0}")]
    NotConfigured(String),
}
