//! Typed records exchanged between pipeline stages.
//!
//! Field names follow the JSON the models are asked to produce and are
//! part of the artifact format, so they stay in Spanish. Every record
//! keeps fields it does not know about in `extra`, which makes
//! persistence lossless.

mod analysis;
mod contract;

pub use analysis::{AnalysisPartida, AnalysisRecord, ResumenGeneral};
pub use contract::{ContractPartida, ContractRecord, Proyecto};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A numeric field as written by a model.
///
/// Models occasionally put text such as `"N/D"` where a number belongs.
/// Those values are kept as-is and excluded from arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(f64),
    Other(Value),
}

impl Amount {
    /// The numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Amount::Number(n) => Some(*n),
            Amount::Other(_) => None,
        }
    }

    /// The numeric value, or zero for anything non-numeric.
    pub fn value_or_zero(&self) -> f64 {
        self.as_f64().unwrap_or(0.0)
    }

    /// Round numbers to `places` decimals; pass everything else through.
    pub fn rounded(&self, places: u32) -> Amount {
        match self {
            Amount::Number(n) => Amount::Number(crate::reconcile::round_to(*n, places)),
            Amount::Other(v) => Amount::Other(v.clone()),
        }
    }
}

impl Default for Amount {
    fn default() -> Self {
        Amount::Number(0.0)
    }
}

impl From<f64> for Amount {
    fn from(n: f64) -> Self {
        Amount::Number(n)
    }
}

/// An entry in a free-text list such as `alertas`.
///
/// Plain strings are the norm; anything else the model writes (objects
/// with a type and a message, numbers) is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Note {
    Text(String),
    Other(Value),
}

impl Note {
    /// The text, if this is a plain string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Note::Text(s) => Some(s),
            Note::Other(_) => None,
        }
    }
}

impl From<&str> for Note {
    fn from(s: &str) -> Self {
        Note::Text(s.to_string())
    }
}

/// Read `null` the same way as an absent field.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_amount_accepts_integers_and_floats() {
        let a: Amount = serde_json::from_value(json!(10)).unwrap();
        let b: Amount = serde_json::from_value(json!(10.5)).unwrap();
        assert_eq!(a.as_f64(), Some(10.0));
        assert_eq!(b.as_f64(), Some(10.5));
    }

    #[test]
    fn test_amount_keeps_text() {
        let a: Amount = serde_json::from_value(json!("N/D")).unwrap();
        assert_eq!(a, Amount::Other(json!("N/D")));
        assert_eq!(a.value_or_zero(), 0.0);
        assert_eq!(a.rounded(2), a);
    }

    #[test]
    fn test_note_keeps_structured_entries() {
        let notes: Vec<Note> =
            serde_json::from_value(json!(["Revisar volúmenes", {"tipo": "precio"}, 3])).unwrap();
        assert_eq!(notes[0].as_str(), Some("Revisar volúmenes"));
        assert_eq!(notes[1], Note::Other(json!({"tipo": "precio"})));
        assert_eq!(notes[2].as_str(), None);
        assert_eq!(
            serde_json::to_value(&notes).unwrap(),
            json!(["Revisar volúmenes", {"tipo": "precio"}, 3])
        );
    }

    #[test]
    fn test_amount_rounding() {
        assert_eq!(Amount::Number(1.23456).rounded(2), Amount::Number(1.23));
        assert_eq!(Amount::Number(1.23456).rounded(4), Amount::Number(1.2346));
    }
}
