//! Contract record produced by the extraction stage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{nullable, Amount};
use crate::{RecordError, Stage};

/// General data about the project under contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Proyecto {
    #[serde(default, deserialize_with = "nullable")]
    pub nombre: String,

    #[serde(default, deserialize_with = "nullable")]
    pub lugar: String,

    #[serde(default, deserialize_with = "nullable")]
    pub contrato_no: String,

    #[serde(default, deserialize_with = "nullable")]
    pub contratista: String,

    /// Total contract amount in MXN, VAT included when the contract says so
    #[serde(
        rename = "monto_total_contrato_MXN",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub monto_total_contrato: Option<Amount>,

    #[serde(default, deserialize_with = "nullable")]
    pub fecha_inicio_programada: String,

    #[serde(default, deserialize_with = "nullable")]
    pub fecha_termino_programada: String,

    #[serde(default, deserialize_with = "nullable")]
    pub objetivo: String,

    /// Main technical activities
    #[serde(default, deserialize_with = "nullable")]
    pub alcance_tecnico: Vec<String>,

    /// Relevant notes (standards, quality control, contract type, materials)
    #[serde(default, deserialize_with = "nullable")]
    pub observaciones: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A line item as written in the contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractPartida {
    #[serde(default, deserialize_with = "nullable")]
    pub descripcion: String,

    #[serde(default, deserialize_with = "nullable")]
    pub unidad: String,

    #[serde(default)]
    pub cantidad: Option<Amount>,

    /// Unit price
    #[serde(default)]
    pub precio: Option<Amount>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Structured contract extracted from the project documents.
///
/// The extraction schema is loose: every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    #[serde(default, deserialize_with = "nullable")]
    pub proyecto: Proyecto,

    #[serde(default, deserialize_with = "nullable")]
    pub partidas: Vec<ContractPartida>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContractRecord {
    /// Build a typed record from a coerced extraction object.
    pub fn from_object(object: &Map<String, Value>) -> Result<Self, RecordError> {
        serde_json::from_value(Value::Object(object.clone())).map_err(|source| {
            RecordError::MalformedRecord {
                stage: Stage::Extraction,
                source,
            }
        })
    }

    /// Sum of quantity times unit price over every line item.
    ///
    /// Missing or non-numeric quantities and prices count as zero.
    pub fn partidas_total(&self) -> f64 {
        self.partidas
            .iter()
            .map(|p| {
                let cantidad = p.cantidad.as_ref().map_or(0.0, Amount::value_or_zero);
                let precio = p.precio.as_ref().map_or(0.0, Amount::value_or_zero);
                cantidad * precio
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_parse_full_contract() {
        let record = ContractRecord::from_object(&object(json!({
            "proyecto": {
                "nombre": "Pavimentación calle 5",
                "lugar": "Tlaxcala",
                "contrato_no": "OP-2024-017",
                "contratista": "Constructora Ejemplo SA de CV",
                "monto_total_contrato_MXN": 1250000.5,
                "fecha_inicio_programada": "2024-03-01",
                "fecha_termino_programada": "2024-06-30",
                "objetivo": "Pavimentar 800 m de calle",
                "alcance_tecnico": ["Terracerías", "Carpeta asfáltica"],
                "observaciones": ["Precio unitario"]
            },
            "partidas": [
                { "descripcion": "Carpeta asfáltica 5 cm", "unidad": "m2", "cantidad": 4800, "precio": 185.4 }
            ]
        })))
        .unwrap();

        assert_eq!(record.proyecto.contrato_no, "OP-2024-017");
        assert_eq!(
            record.proyecto.monto_total_contrato,
            Some(Amount::Number(1250000.5))
        );
        assert_eq!(record.partidas.len(), 1);
        assert!((record.partidas_total() - 4800.0 * 185.4).abs() < 1e-6);
    }

    #[test]
    fn test_loose_contract_defaults() {
        let record = ContractRecord::from_object(&object(json!({
            "proyecto": { "nombre": null, "alcance_tecnico": null },
            "partidas": null
        })))
        .unwrap();

        assert_eq!(record.proyecto.nombre, "");
        assert!(record.proyecto.alcance_tecnico.is_empty());
        assert!(record.partidas.is_empty());
        assert_eq!(record.partidas_total(), 0.0);
    }

    #[test]
    fn test_unknown_fields_are_preserved() {
        let record = ContractRecord::from_object(&object(json!({
            "proyecto": { "nombre": "X", "municipio": "Apizaco" },
            "partidas": [],
            "anexos": ["A1"]
        })))
        .unwrap();

        assert_eq!(record.proyecto.extra["municipio"], "Apizaco");
        assert_eq!(record.extra["anexos"], json!(["A1"]));
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let err = ContractRecord::from_object(&object(json!({ "partidas": "ninguna" }))).unwrap_err();
        assert!(matches!(
            err,
            RecordError::MalformedRecord {
                stage: Stage::Extraction,
                ..
            }
        ));
    }
}
