use std::collections::BTreeMap;

use crate::value::DataValue;

/// Per-script key-value state.
///
/// `durable` entries are written to the script's data document on save,
/// `transient` entries live only as long as the owning binding. Values are
/// expected to be canonical already; the scripting bridge converts before
/// calling in here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptData {
    durable: BTreeMap<String, DataValue>,
    transient: BTreeMap<String, DataValue>,
}

impl ScriptData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_durable(durable: BTreeMap<String, DataValue>) -> Self {
        Self {
            durable,
            transient: BTreeMap::new(),
        }
    }

    pub fn durable(&self) -> &BTreeMap<String, DataValue> {
        &self.durable
    }

    pub fn get(&self, key: &str) -> DataValue {
        read(&self.durable, key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: DataValue) {
        self.durable.insert(key.into(), value);
    }

    pub fn set_if_absent(&mut self, key: impl Into<String>, value: DataValue) {
        write_if_absent(&mut self.durable, key.into(), value);
    }

    /// Nulls the entry; the key stays visible to iteration.
    pub fn remove(&mut self, key: impl Into<String>) {
        self.durable.insert(key.into(), DataValue::Null);
    }

    pub fn clear(&mut self) {
        self.durable.clear();
    }

    pub fn exists(&self, key: &str) -> bool {
        !self.get(key).is_null()
    }

    pub fn is_empty(&self) -> bool {
        self.durable.is_empty()
    }

    pub fn get_temp(&self, key: &str) -> DataValue {
        read(&self.transient, key)
    }

    pub fn set_temp(&mut self, key: impl Into<String>, value: DataValue) {
        self.transient.insert(key.into(), value);
    }

    pub fn set_temp_if_absent(&mut self, key: impl Into<String>, value: DataValue) {
        write_if_absent(&mut self.transient, key.into(), value);
    }

    pub fn remove_temp(&mut self, key: impl Into<String>) {
        self.transient.insert(key.into(), DataValue::Null);
    }

    pub fn clear_temp(&mut self) {
        self.transient.clear();
    }

    pub fn exists_temp(&self, key: &str) -> bool {
        !self.get_temp(key).is_null()
    }

    pub fn is_temp_empty(&self) -> bool {
        self.transient.is_empty()
    }

    /// Applies edits a script made to a raw copy of the durable mapping.
    ///
    /// Only keys whose value differs from `before` are touched, so writes made
    /// through the accessor during the same evaluation survive.
    pub fn merge_durable(
        &mut self,
        before: &BTreeMap<String, DataValue>,
        after: BTreeMap<String, DataValue>,
    ) {
        for key in before.keys() {
            if !after.contains_key(key) {
                self.durable.remove(key);
            }
        }
        for (key, value) in after {
            if before.get(&key) != Some(&value) {
                self.durable.insert(key, value);
            }
        }
    }
}

fn read(map: &BTreeMap<String, DataValue>, key: &str) -> DataValue {
    map.get(key).cloned().unwrap_or(DataValue::Null)
}

fn write_if_absent(map: &mut BTreeMap<String, DataValue>, key: String, value: DataValue) {
    let entry = map.entry(key).or_insert(DataValue::Null);
    if entry.is_null() {
        *entry = value;
    }
}
