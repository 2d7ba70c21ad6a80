//! # obra-core
//!
//! Deterministic building blocks for construction-contract cost analysis.
//!
//! This crate never talks to a language model. It owns everything that
//! must behave the same on every run:
//! - Typed contract and analysis records
//! - Coercion of model text into JSON objects
//! - Prompt templates and marker substitution
//! - Required-key and JSON Schema validation
//! - Numeric reconciliation of line items
//!
//! ## Example
//!
//! ```rust,ignore
//! use obra_core::{coerce_object, reconcile, validate_required_keys, AnalysisRecord, Stage};
//! use obra_core::validation::ANALYSIS_REQUIRED_KEYS;
//!
//! let object = coerce_object(raw_text, Stage::Analysis)?;
//! validate_required_keys(&object, ANALYSIS_REQUIRED_KEYS)?;
//! let mut record = AnalysisRecord::from_object(object)?;
//! reconcile(&mut record);
//! ```

pub mod coerce;
pub mod prompts;
pub mod reconcile;
pub mod records;
pub mod validation;

pub use coerce::{coerce_object, Payload};
pub use prompts::{PromptTemplate, ANALYSIS_PROMPT, EXTRACTION_PROMPT};
pub use reconcile::{reconcile, round_to, summary_drift, SummaryDrift};
pub use records::{
    AnalysisPartida, AnalysisRecord, Amount, ContractPartida, ContractRecord, Proyecto,
    Note, ResumenGeneral,
};
pub use validation::{validate_required_keys, validate_schema, SchemaKind};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The two model-backed stages of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Documents to contract record
    Extraction,
    /// Contract record to cost comparison
    Analysis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extraction => write!(f, "extraction"),
            Stage::Analysis => write!(f, "analysis"),
        }
    }
}

/// Errors raised while turning model output into validated records.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("{stage} stage returned invalid JSON: {source}")]
    InvalidJson {
        stage: Stage,
        #[source]
        source: serde_json::Error,
    },

    #[error("{stage} stage produced an unsupported payload ({kind}); expected a JSON object")]
    UnsupportedPayloadType { stage: Stage, kind: &'static str },

    #[error("record is missing required keys: {missing:?}")]
    MissingKeys { missing: Vec<String> },

    #[error("{stage} record has an unexpected shape: {source}")]
    MalformedRecord {
        stage: Stage,
        #[source]
        source: serde_json::Error,
    },

    #[error("{stage} record violates its schema: {}", errors.join("; "))]
    SchemaViolation { stage: Stage, errors: Vec<String> },
}
