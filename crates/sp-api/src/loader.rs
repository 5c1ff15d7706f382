use std::fs;
use std::path::Path;
use std::sync::Arc;

use rhai::Engine;
use sp_core::error::map_error;
use sp_core::{LoadOutcome, PlaceholderError, ScriptDefinition};
use sp_runtime::{AppContext, EngineRegistry, ScriptBinding};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigEntry, PlaceholderConfig};
use crate::registry::PlaceholderRegistry;
use crate::status::LoadStatus;

/// Turns configuration entries into registered script bindings.
pub struct LoadPipeline<'a> {
    context: &'a Arc<AppContext>,
    engines: &'a EngineRegistry,
}

enum ScriptSource {
    Created,
    Ready(String),
}

impl<'a> LoadPipeline<'a> {
    pub fn new(context: &'a Arc<AppContext>, engines: &'a EngineRegistry) -> Self {
        Self { context, engines }
    }

    /// Loads every entry, emits the status summary and returns the number of
    /// scripts now registered.
    pub fn load(&self, config: &PlaceholderConfig, registry: &mut PlaceholderRegistry) -> usize {
        if self.context.debug() {
            info!(engines = ?self.engines.names(), "available script engines");
        }
        let status = self.run(config, registry);
        status.emit(self.context.debug());
        registry.len()
    }

    pub fn run(&self, config: &PlaceholderConfig, registry: &mut PlaceholderRegistry) -> LoadStatus {
        let mut status = LoadStatus::new();
        let scripts_dir = self.context.scripts_dir();
        if let Err(error) = fs::create_dir_all(&scripts_dir) {
            warn!(path = %scripts_dir.display(), error = %error, "could not create scripts directory");
        }
        for entry in config.entries() {
            self.load_entry(&entry, &scripts_dir, registry, &mut status);
        }
        status
    }

    fn load_entry(
        &self,
        entry: &ConfigEntry,
        scripts_dir: &Path,
        registry: &mut PlaceholderRegistry,
        status: &mut LoadStatus,
    ) {
        let identifier = entry.identifier.as_str();
        let Some(file) = entry.file.as_deref().filter(|file| !file.trim().is_empty()) else {
            status.add(identifier, LoadOutcome::MissingFileSpec);
            return;
        };

        let source = match read_or_create(&scripts_dir.join(file)) {
            Ok(ScriptSource::Created) => {
                status.add(file, LoadOutcome::FileCreated);
                return;
            }
            Ok(ScriptSource::Ready(source)) if !source.trim().is_empty() => source,
            Ok(ScriptSource::Ready(_)) => {
                status.add(file, LoadOutcome::FileEmpty);
                return;
            }
            Err(error) if error.code == "SCRIPT_CREATE" => {
                error!(file, error = %error, "An error occurred while creating the script file");
                status.add(file, LoadOutcome::FileCreationFailed);
                return;
            }
            Err(error) => {
                warn!(file, error = %error, "could not read script file");
                status.add(file, LoadOutcome::FileEmpty);
                return;
            }
        };

        if !registry.is_valid_identifier(identifier) {
            status.add(identifier, LoadOutcome::IdentifierInvalid);
            return;
        }

        let Some((engine_name, engine)) = self.resolve_engine(entry, status) else {
            return;
        };

        let definition = match entry.engine.as_deref() {
            Some(engine) => ScriptDefinition::new(identifier, source).with_engine(engine),
            None => ScriptDefinition::new(identifier, source),
        };
        let binding = match ScriptBinding::new(engine, &engine_name, definition, self.context.clone()) {
            Ok(binding) => Arc::new(binding),
            Err(error) => {
                warn!(identifier, error = %error, "could not build script binding");
                status.add(identifier, LoadOutcome::IdentifierInvalid);
                return;
            }
        };

        if registry.register(binding.clone()) {
            if binding.load_data() {
                status.add(identifier, LoadOutcome::DataLoaded);
            }
            status.add(identifier, LoadOutcome::PlaceholderLoaded);
        } else {
            status.add(identifier, LoadOutcome::PlaceholderDuplicateRejected);
        }
    }

    fn resolve_engine(
        &self,
        entry: &ConfigEntry,
        status: &mut LoadStatus,
    ) -> Option<(String, Engine)> {
        let identifier = entry.identifier.as_str();
        match entry.engine.as_deref() {
            None => status.add(identifier, LoadOutcome::EngineUnspecifiedDefaulted),
            Some(name) => match self.engines.create(name) {
                Ok(engine) => return Some((name.to_string(), engine)),
                Err(error) => {
                    debug!(identifier, error = %error, "falling back to the default engine");
                    status.add(identifier, LoadOutcome::EngineInvalidDefaulted);
                }
            },
        }
        match self.engines.create_default() {
            Ok(resolved) => Some(resolved),
            Err(error) => {
                error!(identifier, error = %error, "could not resolve a script engine");
                status.add(identifier, LoadOutcome::EngineResolutionFailed);
                None
            }
        }
    }
}

fn read_or_create(path: &Path) -> Result<ScriptSource, PlaceholderError> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| map_error("SCRIPT_CREATE", error))?;
        }
        fs::write(path, "").map_err(|error| map_error("SCRIPT_CREATE", error))?;
        return Ok(ScriptSource::Created);
    }
    fs::read_to_string(path)
        .map(ScriptSource::Ready)
        .map_err(|error| map_error("SCRIPT_READ", error))
}
