use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// A feature property value.
///
/// Basic (v1/v2) layers only ever produce the scalar variants.
/// Extended (v3) attributes may additionally produce [`Value::Null`],
/// lists and maps, which nest arbitrarily.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Float(f32),
    Double(f64),
    /// A signed integer (`int64` or `sint64` on the wire).
    Int(i64),
    /// An unsigned integer (`uint64` on the wire).
    UInt(u64),
    Bool(bool),
    Null,
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Returns the string contents if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an `f64` if it is numeric.
    ///
    /// Large 64-bit integers lose precision.
    #[expect(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(f64::from(v)),
            Value::Double(v) => Some(v),
            Value::Int(v) => Some(v as f64),
            Value::UInt(v) => Some(v as f64),
            _ => None,
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::UInt(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// A feature identifier.
///
/// v1/v2 tiles only carry integer IDs; v3 tiles may use strings instead.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum FeatureId {
    Integer(u64),
    String(String),
}

impl Display for FeatureId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureId::Integer(id) => write!(f, "{id}"),
            FeatureId::String(id) => f.write_str(id),
        }
    }
}

/// Reconstructs real values from delta-encoded integers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scaling {
    pub offset: i64,
    pub multiplier: f64,
    pub base: f64,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            offset: 0,
            multiplier: 1.0,
            base: 0.0,
        }
    }
}

impl Scaling {
    /// Computes `base + multiplier * (value + offset)`.
    #[inline]
    #[expect(clippy::cast_precision_loss)]
    pub fn scale(&self, value: i64) -> f64 {
        self.base + self.multiplier * (value.wrapping_add(self.offset) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_default_scaling_is_identity() {
        let scaling = Scaling::default();
        assert_approx_eq!(scaling.scale(42), 42.0);
        assert_approx_eq!(scaling.scale(-7), -7.0);
    }

    #[test]
    fn test_scaling() {
        let scaling = Scaling {
            offset: 10,
            multiplier: 0.5,
            base: 100.0,
        };
        assert_approx_eq!(scaling.scale(2), 106.0);
    }

    #[test]
    fn test_value_serialization() {
        let mut map = IndexMap::new();
        map.insert("a".to_string(), Value::Null);
        map.insert("b".to_string(), Value::List(vec![Value::Int(-1), true.into()]));
        let value = Value::Map(map);

        assert_eq!(
            serde_json::to_string(&value).expect("Unable to serialize"),
            r#"{"a":null,"b":[-1,true]}"#
        );
        assert_eq!(
            serde_json::to_string(&FeatureId::String("way/1".to_string()))
                .expect("Unable to serialize"),
            r#""way/1""#
        );
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(Value::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::UInt(3).as_f64(), Some(3.0));
        assert_eq!(Value::from("x").as_f64(), None);
        assert_eq!(Value::from("x").as_str(), Some("x"));
    }
}
