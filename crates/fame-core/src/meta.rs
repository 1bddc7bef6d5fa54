//! Envelope metadata values.
//!
//! `meta` values are restricted to a flat grammar: a primitive, an array of
//! primitives, or a single-level record of primitives. Anything deeper is
//! rejected at construction and at deserialization.

use crate::error::EnvelopeError;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata map attached to an envelope.
pub type Meta = BTreeMap<String, MetaValue>;

/// A primitive metadata value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaScalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// A metadata value: a primitive or a one-level container of primitives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Scalar(MetaScalar),
    List(Vec<MetaScalar>),
    Record(BTreeMap<String, MetaScalar>),
}

impl MetaScalar {
    fn from_json(value: Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Int(i)),
                None => n
                    .as_f64()
                    .map(Self::Float)
                    .ok_or_else(|| format!("number {n} is out of range")),
            },
            Value::String(s) => Ok(Self::Str(s)),
            Value::Null => Err("null is not a metadata value".to_string()),
            Value::Array(_) | Value::Object(_) => {
                Err("containers may only hold primitives".to_string())
            }
        }
    }
}

impl TryFrom<Value> for MetaValue {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(MetaScalar::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| MetaScalar::from_json(v).map(|s| (k, s)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Self::Record),
            other => MetaScalar::from_json(other).map(Self::Scalar),
        }
    }
}

impl<'de> Deserialize<'de> for MetaValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::try_from(value).map_err(de::Error::custom)
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Scalar(MetaScalar::Str(s.to_string()))
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::Scalar(MetaScalar::Str(s))
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        Self::Scalar(MetaScalar::Int(i))
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        Self::Scalar(MetaScalar::Bool(b))
    }
}

/// Convert a loosely-typed JSON object into a validated [`Meta`] map.
pub fn meta_from_json(value: Value) -> Result<Meta, EnvelopeError> {
    let Value::Object(map) = value else {
        return Err(EnvelopeError::InvalidMeta {
            key: String::new(),
            reason: "meta must be an object".to_string(),
        });
    };
    map.into_iter()
        .map(|(key, v)| match MetaValue::try_from(v) {
            Ok(mv) => Ok((key, mv)),
            Err(reason) => Err(EnvelopeError::InvalidMeta { key, reason }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_values_accepted() {
        let meta = meta_from_json(json!({
            "s": "x",
            "n": 3,
            "f": 1.5,
            "b": true,
            "list": [1, "two", false],
            "rec": {"a": 1, "b": "c"},
        }))
        .unwrap();
        assert_eq!(meta["n"], MetaValue::from(3_i64));
        assert_eq!(
            meta["list"],
            MetaValue::List(vec![
                MetaScalar::Int(1),
                MetaScalar::Str("two".into()),
                MetaScalar::Bool(false)
            ])
        );
    }

    #[test]
    fn test_nested_values_rejected() {
        let err = meta_from_json(json!({"deep": {"a": {"b": 1}}})).unwrap_err();
        match err {
            EnvelopeError::InvalidMeta { key, .. } => assert_eq!(key, "deep"),
            other => panic!("expected InvalidMeta, got {other:?}"),
        }
        assert!(meta_from_json(json!({"deep": [[1]]})).is_err());
        assert!(meta_from_json(json!({"nil": null})).is_err());
    }

    #[test]
    fn test_deserialize_enforces_grammar() {
        let ok: Meta = serde_json::from_value(json!({"k": ["a", 1]})).unwrap();
        assert_eq!(ok.len(), 1);
        assert!(serde_json::from_value::<Meta>(json!({"k": {"a": [1]}})).is_err());
    }
}
