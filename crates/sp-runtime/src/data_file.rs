use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use sp_core::error::map_error;
use sp_core::{DataValue, PlaceholderError};

/// On-disk JSON document holding one script's durable data.
#[derive(Debug, Clone, PartialEq)]
pub struct DataDocument {
    path: PathBuf,
    entries: BTreeMap<String, DataValue>,
}

impl DataDocument {
    /// Reads the document at `path`, creating an empty file when none exists.
    /// The flag reports whether the file was created by this call.
    pub fn open(path: &Path) -> Result<(Self, bool), PlaceholderError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|error| map_error("DATA_CREATE", error))?;

        if !path.exists() {
            fs::write(path, "").map_err(|error| map_error("DATA_CREATE", error))?;
            return Ok((Self::empty(path), true));
        }

        let raw = fs::read_to_string(path).map_err(|error| map_error("DATA_READ", error))?;
        if raw.trim().is_empty() {
            return Ok((Self::empty(path), false));
        }

        let entries = serde_json::from_str::<BTreeMap<String, DataValue>>(&raw)
            .map_err(|error| map_error("DATA_INVALID", error))?;
        Ok((
            Self {
                path: path.to_path_buf(),
                entries,
            },
            false,
        ))
    }

    fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            entries: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &BTreeMap<String, DataValue> {
        &self.entries
    }

    pub fn set(&mut self, key: impl Into<String>, value: DataValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn save(&self) -> Result<(), PlaceholderError> {
        let payload = serde_json::to_string_pretty(&self.entries)
            .map_err(|error| map_error("DATA_WRITE", error))?;
        fs::write(&self.path, payload).map_err(|error| map_error("DATA_WRITE", error))
    }
}
