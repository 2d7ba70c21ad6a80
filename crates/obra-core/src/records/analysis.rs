//! Cost-comparison record produced by the analysis stage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{nullable, Amount, Note};
use crate::{RecordError, Stage};

/// Aggregate summary of the whole contract.
///
/// Totals are computed by the model; reconciliation only re-rounds them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumenGeneral {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub costo_en_contrato: Option<Amount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precio_estimado_mercado: Option<Amount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diferencia_total: Option<Amount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diferencia_porcentaje: Option<Amount>,

    /// 0-100, higher when contract and market prices agree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credibilidad: Option<Amount>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A reconciled line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPartida {
    #[serde(default, deserialize_with = "nullable")]
    pub concepto: String,

    #[serde(default, deserialize_with = "nullable")]
    pub unidad: String,

    #[serde(default, deserialize_with = "nullable")]
    pub cantidad: Amount,

    /// Unit cost recorded in the contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub costo_en_contrato: Option<Amount>,

    /// Unit price estimated for the market
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precio_estimado_mercado: Option<Amount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diferencia: Option<Amount>,

    #[serde(
        rename = "diferencia_%",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub diferencia_porcentaje: Option<Amount>,

    /// Where the market price came from; usually text, kept as written
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub observaciones: Value,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Final artifact of a pipeline run.
///
/// The four top-level sections are mandatory; there is no serde default
/// for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub resumen_general: ResumenGeneral,
    pub partidas: Vec<AnalysisPartida>,
    pub alertas: Vec<Note>,
    pub recomendaciones: Vec<Note>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnalysisRecord {
    /// Build a typed record from a coerced analysis object.
    pub fn from_object(object: Map<String, Value>) -> Result<Self, RecordError> {
        serde_json::from_value(Value::Object(object)).map_err(|source| {
            RecordError::MalformedRecord {
                stage: Stage::Analysis,
                source,
            }
        })
    }

    /// Serialize back to a JSON value for persistence.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
