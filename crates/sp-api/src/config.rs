use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use sp_core::error::map_error;
use sp_core::PlaceholderError;
use tracing::{info, warn};

pub const EXAMPLE_IDENTIFIER: &str = "example";
pub const EXAMPLE_FILE: &str = "example.rhai";

/// One top-level entry of the placeholder configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub identifier: String,
    pub file: Option<String>,
    pub engine: Option<String>,
}

/// The `placeholders.json` document: identifier -> `{ file, engine }`.
#[derive(Debug, Clone)]
pub struct PlaceholderConfig {
    path: PathBuf,
    document: Map<String, Value>,
}

impl PlaceholderConfig {
    /// Reads the document, seeding and writing an example entry when it is
    /// missing or empty. A document that fails to parse is left on disk
    /// untouched and treated as empty.
    pub fn load(path: &Path) -> Self {
        let mut config = Self {
            path: path.to_path_buf(),
            document: Map::new(),
        };

        match read_document(path) {
            Ok(Some(document)) => config.document = document,
            Ok(None) => {}
            Err(error) => {
                warn!(path = %path.display(), error = %error, "could not read placeholder config");
                return config;
            }
        }

        if config.document.is_empty() {
            config.seed_example();
            match config.save() {
                Ok(()) => info!(path = %path.display(), "wrote default placeholder config"),
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "Could not save placeholder config")
                }
            }
        }
        config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    pub fn entries(&self) -> Vec<ConfigEntry> {
        self.document
            .iter()
            .map(|(identifier, value)| ConfigEntry {
                identifier: identifier.clone(),
                file: value
                    .get("file")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                engine: value.get("engine").map(|engine| match engine {
                    Value::String(name) => name.clone(),
                    other => other.to_string(),
                }),
            })
            .collect()
    }

    pub fn save(&self) -> Result<(), PlaceholderError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|error| map_error("CONFIG_WRITE", error))?;
            }
        }
        let payload = serde_json::to_string_pretty(&self.document)
            .map_err(|error| map_error("CONFIG_WRITE", error))?;
        fs::write(&self.path, payload).map_err(|error| map_error("CONFIG_WRITE", error))
    }

    fn seed_example(&mut self) {
        let mut entry = Map::new();
        entry.insert("file".to_string(), Value::String(EXAMPLE_FILE.to_string()));
        self.document
            .insert(EXAMPLE_IDENTIFIER.to_string(), Value::Object(entry));
    }
}

fn read_document(path: &Path) -> Result<Option<Map<String, Value>>, PlaceholderError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|error| map_error("CONFIG_READ", error))?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(&raw).map_err(|error| map_error("CONFIG_INVALID", error))? {
        Value::Object(document) => Ok(Some(document)),
        other => Err(PlaceholderError::new(
            "CONFIG_INVALID",
            format!("expected an object at the top level, found {}", other),
        )),
    }
}
