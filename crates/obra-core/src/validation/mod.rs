//! Record validation.
//!
//! Two layers:
//! - Required top-level keys, reported exactly ([`validate_required_keys`])
//! - JSON Schema shape checks against the embedded schemas ([`validate_schema`])

mod schema;

pub use schema::{validate_schema, SchemaKind};

use serde_json::{Map, Value};

use crate::RecordError;

/// Top-level sections every analysis record must carry.
pub const ANALYSIS_REQUIRED_KEYS: &[&str] =
    &["resumen_general", "partidas", "alertas", "recomendaciones"];

/// Top-level sections of a contract record.
pub const CONTRACT_REQUIRED_KEYS: &[&str] = &["proyecto", "partidas"];

/// Check that `record` carries every key in `required`.
///
/// On failure the error lists exactly the missing keys, in the order
/// they appear in `required`.
pub fn validate_required_keys(
    record: &Map<String, Value>,
    required: &[&str],
) -> Result<(), RecordError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|key| !record.contains_key(**key))
        .map(|key| key.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(RecordError::MissingKeys { missing })
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
    fn test_complete_record_passes() {
        let record = object(json!({
            "resumen_general": {},
            "partidas": [],
            "alertas": [],
            "recomendaciones": []
        }));
        assert!(validate_required_keys(&record, ANALYSIS_REQUIRED_KEYS).is_ok());
    }

    #[test]
    fn test_reports_exactly_the_missing_key() {
        let record = object(json!({
            "resumen_general": {},
            "partidas": [],
            "recomendaciones": []
        }));
        match validate_required_keys(&record, ANALYSIS_REQUIRED_KEYS) {
            Err(RecordError::MissingKeys { missing }) => assert_eq!(missing, vec!["alertas"]),
            other => panic!("Expected MissingKeys, got {other:?}"),
        }
    }

    #[test]
    fn test_reports_missing_keys_in_required_order() {
        let record = object(json!({ "partidas": [] }));
        match validate_required_keys(&record, ANALYSIS_REQUIRED_KEYS) {
            Err(RecordError::MissingKeys { missing }) => assert_eq!(
                missing,
                vec!["resumen_general", "alertas", "recomendaciones"]
            ),
            other => panic!("Expected MissingKeys, got {other:?}"),
        }
    }

    #[test]
    fn test_null_value_counts_as_present() {
        let record = object(json!({ "proyecto": null, "partidas": [] }));
        assert!(validate_required_keys(&record, CONTRACT_REQUIRED_KEYS).is_ok());
    }

    #[test]
    fn test_extra_keys_are_ignored() {
        let record = object(json!({ "proyecto": {}, "partidas": [], "otro": 1 }));
        assert!(validate_required_keys(&record, CONTRACT_REQUIRED_KEYS).is_ok());
    }
}
