use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical shape of every value held by a data store or returned by a script.
///
/// The variant order matters for deserialization: integers are tried before
/// floats so that whole JSON numbers stay integral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum DataValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<DataValue>),
    Map(BTreeMap<String, DataValue>),
}

impl DataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text form handed back to the host after evaluation.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => float_to_text(*value),
            Self::String(value) => value.clone(),
            Self::Array(_) | Self::Map(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

fn float_to_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<DataValue>> for DataValue {
    fn from(value: Vec<DataValue>) -> Self {
        Self::Array(value)
    }
}

impl From<BTreeMap<String, DataValue>> for DataValue {
    fn from(value: BTreeMap<String, DataValue>) -> Self {
        Self::Map(value)
    }
}
