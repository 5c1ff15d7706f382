use std::collections::BTreeMap;

use rhai::{Array, Dynamic, ImmutableString, Map, FLOAT, INT};
use sp_core::DataValue;

/// Canonicalizes a script value into the data model.
///
/// Anything without a structured counterpart (custom handles, function
/// pointers, timestamps) is kept as its display string.
pub fn dynamic_to_value(value: Dynamic) -> DataValue {
    let value = value.flatten();
    if value.is_unit() {
        return DataValue::Null;
    }
    if value.is::<bool>() {
        return DataValue::Bool(value.cast::<bool>());
    }
    if value.is::<INT>() {
        return DataValue::Int(value.cast::<INT>());
    }
    if value.is::<FLOAT>() {
        return DataValue::Float(value.cast::<FLOAT>());
    }
    if value.is::<ImmutableString>() {
        return DataValue::String(value.cast::<ImmutableString>().to_string());
    }
    if value.is::<char>() {
        return DataValue::String(value.cast::<char>().to_string());
    }
    if value.is::<Array>() {
        return DataValue::Array(
            value
                .cast::<Array>()
                .into_iter()
                .map(dynamic_to_value)
                .collect(),
        );
    }
    if value.is::<Map>() {
        return DataValue::Map(map_to_values(value.cast::<Map>()));
    }
    DataValue::String(value.to_string())
}

pub(crate) fn map_to_values(map: Map) -> BTreeMap<String, DataValue> {
    map.into_iter()
        .map(|(key, value)| (key.to_string(), dynamic_to_value(value)))
        .collect()
}

pub fn value_to_dynamic(value: &DataValue) -> Dynamic {
    match value {
        DataValue::Null => Dynamic::UNIT,
        DataValue::Bool(value) => Dynamic::from_bool(*value),
        DataValue::Int(value) => Dynamic::from_int(*value as INT),
        DataValue::Float(value) => Dynamic::from_float(*value as FLOAT),
        DataValue::String(value) => Dynamic::from(value.clone()),
        DataValue::Array(values) => {
            Dynamic::from_array(values.iter().map(value_to_dynamic).collect::<Array>())
        }
        DataValue::Map(values) => Dynamic::from_map(values_to_map(values)),
    }
}

pub(crate) fn values_to_map(values: &BTreeMap<String, DataValue>) -> Map {
    let mut map = Map::new();
    for (key, value) in values {
        map.insert(key.clone().into(), value_to_dynamic(value));
    }
    map
}
