//! Tagged value union for workflow inputs.
//!
//! Inputs arrive type-erased from the backend. [`InputValue`] gives them
//! an explicit discriminant, with a dedicated ordered-map variant for
//! composite values (multi-field widgets such as LoRA stacks).

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered string-keyed mapping. Insertion order is preserved and
/// sub-fields are never dropped by a partial update.
pub type Composite = IndexMap<String, InputValue>;

/// Current value of one workflow input.
///
/// `List` and `Null` only occur nested inside composites; they exist so
/// that unknown sub-fields survive a round trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<InputValue>),
    Composite(Composite),
}

impl InputValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&Composite> {
        match self {
            Self::Composite(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Composite(_) => "composite",
        }
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::List(_) | Self::Composite(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<serde_json::Value> for InputValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Composite(
                map.into_iter().map(|(k, v)| (k, Self::from(v))).collect(),
            ),
        }
    }
}

impl From<&str> for InputValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for InputValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for InputValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for InputValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for InputValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Composite> for InputValue {
    fn from(map: Composite) -> Self {
        Self::Composite(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_picks_int_before_float() {
        let v: InputValue = serde_json::from_value(json!(7)).unwrap();
        assert_eq!(v, InputValue::Int(7));
        let v: InputValue = serde_json::from_value(json!(7.5)).unwrap();
        assert_eq!(v, InputValue::Float(7.5));
    }

    #[test]
    fn composite_keeps_insertion_order() {
        let v: InputValue =
            serde_json::from_str(r#"{"on":true,"lora":"a.st","strength":1.0}"#).unwrap();
        let keys: Vec<_> = v.as_composite().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["on", "lora", "strength"]);
    }

    #[test]
    fn nested_unknowns_survive_round_trip() {
        let raw = json!({"lora": "a", "extra": [1, null, {"x": "y"}]});
        let v = InputValue::from(raw.clone());
        assert_eq!(serde_json::to_value(&v).unwrap(), raw);
    }

    #[test]
    fn display_of_scalars_is_plain() {
        assert_eq!(InputValue::from("abc").to_string(), "abc");
        assert_eq!(InputValue::Int(7).to_string(), "7");
        assert_eq!(InputValue::Bool(false).to_string(), "false");
    }
}
