pub mod config;
pub mod loader;
pub mod registry;
pub mod status;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sp_core::{PlaceholderError, Requester, ScriptDefinition};
use sp_runtime::{AppContext, EngineRegistry, ScriptBinding};
use tracing::info;

pub use config::{ConfigEntry, PlaceholderConfig};
pub use loader::LoadPipeline;
pub use registry::{split_arguments, PlaceholderRegistry};
pub use status::{plural, LoadStatus, StatusLevel, StatusLine};

pub const AD_HOC_IDENTIFIER: &str = "adhoc";

/// Entry point for a host: owns the loaded placeholders and answers requests.
///
/// Requests share a read lock on the registry; `reload` and `shutdown` take
/// the write lock and therefore wait for in-flight requests.
pub struct ScriptPlaceholders {
    context: Arc<AppContext>,
    engines: EngineRegistry,
    registry: RwLock<PlaceholderRegistry>,
}

impl ScriptPlaceholders {
    pub fn new(context: Arc<AppContext>, engines: EngineRegistry) -> Self {
        let registry = PlaceholderRegistry::new(context.argument_split());
        Self {
            context,
            engines,
            registry: RwLock::new(registry),
        }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.context
    }

    pub fn engines(&self) -> &EngineRegistry {
        &self.engines
    }

    /// Initial load from `placeholders.json`.
    pub fn register(&self) -> usize {
        let mut registry = self.write();
        let loaded = self.load_into(&mut registry);
        info!("{} script{} loaded!", loaded, plural(loaded));
        loaded
    }

    /// `None` when no placeholder matches `body`.
    pub fn on_request(&self, requester: Option<&Requester>, body: &str) -> Option<String> {
        self.read().resolve(requester, body)
    }

    pub fn list_identifiers(&self) -> Vec<String> {
        self.read().identifiers()
    }

    pub fn loaded_count(&self) -> usize {
        self.read().len()
    }

    /// Persists and releases every binding, then loads the configuration again.
    pub fn reload(&self) -> usize {
        let mut registry = self.write();
        release_all(&mut registry);
        self.load_into(&mut registry)
    }

    pub fn save_all(&self) {
        for binding in self.read().bindings() {
            binding.save_data();
        }
    }

    /// Writes one placeholder's data to disk. `false` for an unknown identifier.
    pub fn save_data(&self, identifier: &str) -> bool {
        match self.read().get(identifier) {
            Some(binding) => {
                binding.save_data();
                true
            }
            None => false,
        }
    }

    /// Reloads one placeholder's data from disk. `None` for an unknown
    /// identifier, otherwise whether any data was loaded.
    pub fn load_data(&self, identifier: &str) -> Option<bool> {
        self.read().get(identifier).map(|binding| binding.load_data())
    }

    pub fn shutdown(&self) {
        let mut registry = self.write();
        release_all(&mut registry);
    }

    /// Runs `source` once on the default engine without registering or
    /// persisting anything.
    pub fn evaluate_ad_hoc(
        &self,
        requester: Option<&Requester>,
        source: &str,
    ) -> Result<String, PlaceholderError> {
        let (engine_name, engine) = self.engines.create_default()?;
        let binding = ScriptBinding::new(
            engine,
            &engine_name,
            ScriptDefinition::new(AD_HOC_IDENTIFIER, source),
            self.context.clone(),
        )?;
        let result = binding.evaluate(requester, &[]);
        binding.cleanup();
        Ok(result)
    }

    fn load_into(&self, registry: &mut PlaceholderRegistry) -> usize {
        let config = PlaceholderConfig::load(&self.context.config_path());
        LoadPipeline::new(&self.context, &self.engines).load(&config, registry)
    }

    fn read(&self) -> RwLockReadGuard<'_, PlaceholderRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PlaceholderRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn release_all(registry: &mut PlaceholderRegistry) {
    for binding in registry.clear() {
        binding.save_data();
        binding.cleanup();
    }
}
