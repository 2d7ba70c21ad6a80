//! Coercion of stage output into JSON objects.
//!
//! A stage may hand back raw model text or a value that was already
//! parsed. Both paths end in the same `Map`, so downstream code never
//! has to care which one it got.

use serde_json::{Map, Value};

use crate::{RecordError, Stage};

/// Output of a stage before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw model text expected to hold a JSON object
    Text(String),
    /// A value that has already been parsed
    Structured(Value),
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Structured(value)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Payload::Structured(Value::Object(map))
    }
}

/// Coerce a payload into a JSON object.
///
/// Text is parsed; a parse failure becomes [`RecordError::InvalidJson`]
/// carrying the stage and the parser diagnostic. Anything that is not an
/// object after parsing is rejected with
/// [`RecordError::UnsupportedPayloadType`].
pub fn coerce_object(
    payload: impl Into<Payload>,
    stage: Stage,
) -> Result<Map<String, Value>, RecordError> {
    let value = match payload.into() {
        Payload::Text(text) => serde_json::from_str::<Value>(&text)
            .map_err(|source| RecordError::InvalidJson { stage, source })?,
        Payload::Structured(value) => value,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(RecordError::UnsupportedPayloadType {
            stage,
            kind: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_and_structured_coerce_identically() {
        let from_text = coerce_object(r#"{"a":1}"#, Stage::Extraction).unwrap();
        let from_value = coerce_object(json!({"a": 1}), Stage::Extraction).unwrap();
        assert_eq!(from_text, from_value);
    }

    #[test]
    fn test_invalid_json_carries_stage() {
        let err = coerce_object("not json", Stage::Analysis).unwrap_err();
        match err {
            RecordError::InvalidJson { stage, .. } => assert_eq!(stage, Stage::Analysis),
            other => panic!("Expected InvalidJson, got {other:?}"),
        }
    }

    #[test]
    fn test_non_object_is_unsupported() {
        let err = coerce_object(json!([1, 2, 3]), Stage::Extraction).unwrap_err();
        assert!(matches!(
            err,
            RecordError::UnsupportedPayloadType { kind: "array", .. }
        ));

        let err = coerce_object("42", Stage::Analysis).unwrap_err();
        assert!(matches!(
            err,
            RecordError::UnsupportedPayloadType { kind: "number", .. }
        ));
    }

    #[test]
    fn test_unicode_text_survives() {
        let map = coerce_object(r#"{"lugar":"Mérida, Yucatán"}"#, Stage::Extraction).unwrap();
        assert_eq!(map["lugar"], "Mérida, Yucatán");
    }
}
