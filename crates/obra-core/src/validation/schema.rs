//! JSON Schema validation for pipeline records.
//!
//! Both schemas are embedded at compile time and compiled once.

use std::sync::OnceLock;

use serde_json::Value;

const ANALYSIS_SCHEMA_JSON: &str = include_str!("../../schema/analysis.schema.json");
const CONTRACT_SCHEMA_JSON: &str = include_str!("../../schema/contract.schema.json");

static ANALYSIS_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();
static CONTRACT_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Which embedded schema to validate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// Output of the extraction stage
    Contract,
    /// Output of the analysis stage
    Analysis,
}

impl SchemaKind {
    fn source(self) -> &'static str {
        match self {
            SchemaKind::Contract => CONTRACT_SCHEMA_JSON,
            SchemaKind::Analysis => ANALYSIS_SCHEMA_JSON,
        }
    }

    fn cell(self) -> &'static OnceLock<Result<jsonschema::Validator, String>> {
        match self {
            SchemaKind::Contract => &CONTRACT_SCHEMA,
            SchemaKind::Analysis => &ANALYSIS_SCHEMA,
        }
    }
}

fn get_validator(kind: SchemaKind) -> Result<&'static jsonschema::Validator, String> {
    let result = kind.cell().get_or_init(|| {
        let schema_value: Value = serde_json::from_str(kind.source())
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result.as_ref().map_err(Clone::clone)
}

/// Validate a value against an embedded schema.
///
/// Returns every violation as `"<message> at <instance path>"`.
pub fn validate_schema(kind: SchemaKind, value: &Value) -> Result<(), Vec<String>> {
    let validator = get_validator(kind).map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schemas_compile() {
        assert!(get_validator(SchemaKind::Contract).is_ok());
        assert!(get_validator(SchemaKind::Analysis).is_ok());
    }

    #[test]
    fn test_valid_contract_passes() {
        let value = json!({
            "proyecto": {
                "nombre": "Red de agua potable",
                "monto_total_contrato_MXN": 845000.0,
                "alcance_tecnico": ["Zanjeo", "Tubería PVC 4\""],
                "observaciones": []
            },
            "partidas": [
                { "descripcion": "Tubería PVC", "unidad": "ml", "cantidad": 1200, "precio": 210.5 }
            ]
        });
        assert!(validate_schema(SchemaKind::Contract, &value).is_ok());
    }

    #[test]
    fn test_contract_without_partidas_fails() {
        let value = json!({ "proyecto": {} });
        let errors = validate_schema(SchemaKind::Contract, &value).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("partidas")));
    }

    #[test]
    fn test_contract_with_wrong_types_fails() {
        let value = json!({
            "proyecto": { "alcance_tecnico": "todo" },
            "partidas": [ { "cantidad": true } ]
        });
        let errors = validate_schema(SchemaKind::Contract, &value).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_valid_analysis_passes() {
        let value = json!({
            "resumen_general": {
                "costo_en_contrato": 1000.0,
                "precio_estimado_mercado": 1500.0,
                "diferencia_total": 500.0,
                "diferencia_porcentaje": 50.0,
                "credibilidad": 70
            },
            "partidas": [{
                "concepto": "Concreto",
                "unidad": "m3",
                "cantidad": 10,
                "costo_en_contrato": 100.0,
                "precio_estimado_mercado": 150.0,
                "diferencia": 50.0,
                "diferencia_%": 50.0,
                "observaciones": ""
            }],
            "alertas": [],
            "recomendaciones": []
        });
        assert!(validate_schema(SchemaKind::Analysis, &value).is_ok());
    }

    #[test]
    fn test_analysis_credibility_out_of_range_fails() {
        let value = json!({
            "resumen_general": { "credibilidad": 140 },
            "partidas": [],
            "alertas": [],
            "recomendaciones": []
        });
        let errors = validate_schema(SchemaKind::Analysis, &value).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("/resumen_general/credibilidad")));
    }

    #[test]
    fn test_analysis_accepts_structured_notes() {
        let value = json!({
            "resumen_general": {},
            "partidas": [{
                "unidad": "m3",
                "cantidad": 10,
                "observaciones": ["precio de referencia CMIC"]
            }],
            "alertas": [{ "tipo": "sobreprecio" }],
            "recomendaciones": ["Solicitar cotizaciones"]
        });
        assert!(validate_schema(SchemaKind::Analysis, &value).is_ok());
    }

    #[test]
    fn test_analysis_partida_without_unit_fails() {
        let value = json!({
            "resumen_general": {},
            "partidas": [{ "concepto": "Acero", "cantidad": 2 }],
            "alertas": [],
            "recomendaciones": []
        });
        let errors = validate_schema(SchemaKind::Analysis, &value).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("unidad")));
    }
}
