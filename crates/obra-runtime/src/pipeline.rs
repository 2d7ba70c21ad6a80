//! Folder-to-analysis pipeline.
//!
//! A run walks a fixed sequence of states:
//!
//! ```text
//! Idle -> Extracting -> Extracted -> Analyzing -> Validated -> Reconciled -> Done
//! ```
//!
//! Any state before `Done` may move to `Failed`, which is final. There
//! are no retries and no concurrency: the analysis stage consumes the
//! extraction output, so every step awaits the previous one.
//!
//! Side effects happen in this order:
//! 1. folder check and document reading (no model is contacted before
//!    the documents are known to exist)
//! 2. extraction model selection and call
//! 3. intermediate artifact, when configured; it stays on disk even if
//!    a later step fails
//! 4. contract key and schema checks, when `validate_extraction` is set
//! 5. analysis model selection and call
//! 6. required-key validation, reconciliation, final artifact

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use obra_core::validation::{ANALYSIS_REQUIRED_KEYS, CONTRACT_REQUIRED_KEYS};
use obra_core::{
    reconcile, summary_drift, validate_required_keys, validate_schema, AnalysisRecord,
    ContractRecord, RecordError, SchemaKind, Stage, SummaryDrift, ANALYSIS_PROMPT,
    EXTRACTION_PROMPT,
};

use crate::config::PipelineConfig;
use crate::documents::{DocumentReader, PdfFolderReader};
use crate::persist::write_json;
use crate::providers::{LlmProvider, TokenUsage};
use crate::selector::ModelSelector;
use crate::stage::StageRunner;
use crate::PipelineError;

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Extracting,
    Extracted,
    Analyzing,
    Validated,
    Reconciled,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;

        match (self, next) {
            (Idle, Extracting)
            | (Extracting, Extracted)
            | (Extracted, Analyzing)
            | (Analyzing, Validated)
            | (Validated, Reconciled)
            | (Reconciled, Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Wall time per stage. Stage times include model selection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub extraction: Option<Duration>,
    pub analysis: Option<Duration>,
    pub total: Duration,
}

/// What happened during a run, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub state: PipelineState,
    pub started_at: DateTime<Utc>,
    pub timings: StageTimings,
    pub extraction_model: Option<String>,
    pub analysis_model: Option<String>,
    pub usage: TokenUsage,
    /// Number of line items in the extracted contract, when it parsed
    pub contract_partidas: Option<usize>,
    /// Summary totals that disagree with the line items
    pub drift: Option<SummaryDrift>,
    pub intermediate_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub transitions: Vec<PipelineState>,
}

impl PipelineRun {
    fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            started_at: Utc::now(),
            timings: StageTimings::default(),
            extraction_model: None,
            analysis_model: None,
            usage: TokenUsage::default(),
            contract_partidas: None,
            drift: None,
            intermediate_path: None,
            output_path: None,
            transitions: vec![PipelineState::Idle],
        }
    }

    fn advance(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(from = ?self.state, to = ?next, "Pipeline transition");
        self.state = next;
        self.transitions.push(next);
        Ok(())
    }

    fn add_usage(&mut self, usage: TokenUsage) {
        self.usage.prompt_tokens += usage.prompt_tokens;
        self.usage.completion_tokens += usage.completion_tokens;
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub record: AnalysisRecord,
    pub run: PipelineRun,
}

/// Result of a failed run.
///
/// `run` is already in [`PipelineState::Failed`] and keeps whatever the
/// run got to before the failing step: models chosen, stage timings,
/// token usage and artifacts written.
#[derive(Error, Debug)]
#[error("Pipeline failed in state {failed_in:?}")]
pub struct PipelineFailure {
    /// Last state reached before the failure
    pub failed_in: PipelineState,
    pub run: Box<PipelineRun>,
    #[source]
    pub error: PipelineError,
}

/// Runs the two-stage analysis over a folder of PDFs.
pub struct Pipeline {
    provider: Arc<dyn LlmProvider>,
    documents: Arc<dyn DocumentReader>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        documents: Arc<dyn DocumentReader>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            provider,
            documents,
            config,
        }
    }

    /// Analyze every PDF in `folder`.
    ///
    /// On failure the error comes back together with the failed run.
    /// Artifacts written before the failing step are left in place.
    pub async fn run(&self, folder: &Path) -> Result<PipelineOutcome, PipelineFailure> {
        let start = Instant::now();
        let mut run = PipelineRun::new();

        tracing::info!(folder = %folder.display(), provider = self.provider.name(), "Pipeline started");
        let result = self.execute(folder, &mut run).await;
        run.timings.total = start.elapsed();

        match result {
            Ok(record) => {
                tracing::info!(
                    elapsed_ms = run.timings.total.as_millis() as u64,
                    partidas = record.partidas.len(),
                    alertas = record.alertas.len(),
                    tokens = run.usage.total(),
                    "Pipeline finished"
                );
                Ok(PipelineOutcome { record, run })
            }
            Err(e) => {
                let failed_in = run.state;
                // the state may already be terminal when advance() itself failed
                let _ = run.advance(PipelineState::Failed);
                tracing::error!(
                    state = ?failed_in,
                    elapsed_ms = run.timings.total.as_millis() as u64,
                    error = %e,
                    "Pipeline failed"
                );
                Err(PipelineFailure {
                    failed_in,
                    run: Box::new(run),
                    error: e,
                })
            }
        }
    }

    async fn execute(
        &self,
        folder: &Path,
        run: &mut PipelineRun,
    ) -> Result<AnalysisRecord, PipelineError> {
        if !folder.is_dir() {
            return Err(PipelineError::FolderNotFound {
                path: folder.to_path_buf(),
            });
        }

        let selector = ModelSelector::new(self.provider.clone(), self.config.ping_timeout);
        let runner = StageRunner::new(self.provider.clone(), self.config.request_timeout)
            .with_max_tokens(self.config.max_tokens);

        // Extraction
        run.advance(PipelineState::Extracting)?;
        let stage_start = Instant::now();
        let content = self.documents.read_folder(folder)?;
        let model = selector.select(&self.config.extraction_candidates).await?;
        run.extraction_model = Some(model.clone());

        let (extraction, contract) = runner
            .run_json(Stage::Extraction, &model, &EXTRACTION_PROMPT.build(&content))
            .await?;
        run.add_usage(extraction.usage);
        run.timings.extraction = Some(stage_start.elapsed());
        run.advance(PipelineState::Extracted)?;

        match ContractRecord::from_object(&contract) {
            Ok(record) => {
                run.contract_partidas = Some(record.partidas.len());
                tracing::info!(
                    proyecto = %record.proyecto.nombre,
                    partidas = record.partidas.len(),
                    total = record.partidas_total(),
                    "Contract extracted"
                );
            }
            Err(e) => tracing::warn!(error = %e, "Extracted contract does not match the expected shape"),
        }

        if let Some(path) = &self.config.intermediate_path {
            write_json(path, &contract)?;
            run.intermediate_path = Some(path.clone());
        }

        if self.config.validate_extraction {
            validate_required_keys(&contract, CONTRACT_REQUIRED_KEYS)?;
            validate_schema(SchemaKind::Contract, &JsonValue::Object(contract)).map_err(|errors| {
                RecordError::SchemaViolation {
                    stage: Stage::Extraction,
                    errors,
                }
            })?;
        }

        // Analysis
        run.advance(PipelineState::Analyzing)?;
        let stage_start = Instant::now();
        let model = selector.select(&self.config.analysis_candidates).await?;
        run.analysis_model = Some(model.clone());

        let (analysis, object) = runner
            .run_json(Stage::Analysis, &model, &ANALYSIS_PROMPT.build(&extraction.text))
            .await?;
        run.add_usage(analysis.usage);
        run.timings.analysis = Some(stage_start.elapsed());

        validate_required_keys(&object, ANALYSIS_REQUIRED_KEYS)?;
        let mut record = AnalysisRecord::from_object(object)?;
        run.advance(PipelineState::Validated)?;

        reconcile(&mut record);
        run.drift = summary_drift(&record);
        if let Some(drift) = &run.drift {
            tracing::warn!(
                contrato_delta = ?drift.contrato_delta,
                mercado_delta = ?drift.mercado_delta,
                "Summary totals disagree with line items"
            );
        }
        run.advance(PipelineState::Reconciled)?;

        if let Some(path) = &self.config.output_path {
            write_json(path, &record)?;
            run.output_path = Some(path.clone());
        }
        run.advance(PipelineState::Done)?;

        Ok(record)
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    documents: Option<Arc<dyn DocumentReader>>,
    config: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            documents: None,
            config: PipelineConfig::default(),
        }
    }

    /// Set the LLM provider.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replace the default PDF reader.
    pub fn documents(mut self, documents: Arc<dyn DocumentReader>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the pipeline. Fails without a provider or with invalid settings.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let provider = self
            .provider
            .ok_or_else(|| PipelineError::NotConfigured("No provider set".to_string()))?;
        self.config.validate()?;

        let documents = self
            .documents
            .unwrap_or_else(|| Arc::new(PdfFolderReader::new()));

        Ok(Pipeline::new(provider, documents, self.config))
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
