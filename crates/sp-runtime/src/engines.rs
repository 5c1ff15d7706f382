use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rhai::packages::{CorePackage, Package};
use rhai::Engine;
use sp_core::PlaceholderError;

pub const DEFAULT_ENGINE: &str = "rhai";

pub type EngineFactory = Arc<dyn Fn() -> Engine + Send + Sync>;

/// Named engine constructors with an optional designated default.
///
/// Names are matched case-insensitively. Every `create` call builds a fresh
/// engine; engines are never shared between bindings.
#[derive(Clone)]
pub struct EngineRegistry {
    factories: BTreeMap<String, EngineFactory>,
    default_name: Option<String>,
}

impl EngineRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
            default_name: None,
        }
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(DEFAULT_ENGINE, Engine::new);
        registry.register("rhai-strict", || {
            let mut engine = Engine::new();
            engine.set_strict_variables(true);
            engine
        });
        registry.register("rhai-raw", || {
            let mut engine = Engine::new_raw();
            engine.register_global_module(CorePackage::new().as_shared_module());
            engine
        });
        registry.default_name = Some(DEFAULT_ENGINE.to_string());
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Engine + Send + Sync + 'static,
    {
        self.factories
            .insert(name.to_ascii_lowercase(), Arc::new(factory));
    }

    pub fn set_default(&mut self, name: Option<&str>) {
        self.default_name = name.map(str::to_ascii_lowercase);
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    pub fn create(&self, name: &str) -> Result<Engine, PlaceholderError> {
        let factory = self
            .factories
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| {
                PlaceholderError::new(
                    "ENGINE_NOT_FOUND",
                    format!("Script engine \"{}\" is not registered.", name),
                )
            })?;
        Ok(factory())
    }

    /// Builds the default engine, returning its name alongside.
    pub fn create_default(&self) -> Result<(String, Engine), PlaceholderError> {
        let name = self.default_name.clone().ok_or_else(|| {
            PlaceholderError::new("ENGINE_NOT_FOUND", "No default script engine is configured.")
        })?;
        let engine = self.create(&name)?;
        Ok((name, engine))
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("names", &self.names())
            .field("default_name", &self.default_name)
            .finish()
    }
}
