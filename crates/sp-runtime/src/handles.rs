//! Host objects handed to scripts, and their registration on an engine.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rhai::{Dynamic, Engine, EvalAltResult, Position};
use sp_core::{Requester, ScriptData};

use crate::bridge::{dynamic_to_value, value_to_dynamic};
use crate::context::AppContext;
use crate::host::PlaceholderHost;
use crate::http::HttpUtility;

/// Shared handle to one binding's data store, exposed as `Data`.
#[derive(Clone, Default)]
pub struct DataHandle(Arc<Mutex<ScriptData>>);

impl DataHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, ScriptData> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&mut self, key: &str) -> Dynamic {
        value_to_dynamic(&self.lock().get(key))
    }

    fn set(&mut self, key: &str, value: Dynamic) {
        self.lock().set(key, dynamic_to_value(value));
    }

    fn set_if_absent(&mut self, key: &str, value: Dynamic) {
        self.lock().set_if_absent(key, dynamic_to_value(value));
    }

    fn remove(&mut self, key: &str) {
        self.lock().remove(key);
    }

    fn clear(&mut self) {
        self.lock().clear();
    }

    fn exists(&mut self, key: &str) -> bool {
        self.lock().exists(key)
    }

    fn is_empty(&mut self) -> bool {
        self.lock().is_empty()
    }

    fn get_temp(&mut self, key: &str) -> Dynamic {
        value_to_dynamic(&self.lock().get_temp(key))
    }

    fn set_temp(&mut self, key: &str, value: Dynamic) {
        self.lock().set_temp(key, dynamic_to_value(value));
    }

    fn set_temp_if_absent(&mut self, key: &str, value: Dynamic) {
        self.lock().set_temp_if_absent(key, dynamic_to_value(value));
    }

    fn remove_temp(&mut self, key: &str) {
        self.lock().remove_temp(key);
    }

    fn clear_temp(&mut self) {
        self.lock().clear_temp();
    }

    fn exists_temp(&mut self, key: &str) -> bool {
        self.lock().exists_temp(key)
    }

    fn is_temp_empty(&mut self) -> bool {
        self.lock().is_temp_empty()
    }
}

impl fmt::Debug for DataHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DataHandle").field(&*self.lock()).finish()
    }
}

/// The hosting application, exposed as `Expansion`.
#[derive(Clone)]
pub struct ExpansionHandle(Arc<AppContext>);

impl ExpansionHandle {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self(context)
    }

    fn version(&mut self) -> String {
        self.0.version().to_string()
    }

    fn data_folder(&mut self) -> String {
        self.0.data_folder().display().to_string()
    }

    fn argument_split(&mut self) -> String {
        self.0.argument_split().to_string()
    }

    fn debug(&mut self) -> bool {
        self.0.debug()
    }
}

/// Read-only view of the enclosing binding, exposed as `Placeholder`.
#[derive(Debug, Clone)]
pub struct PlaceholderHandle {
    identifier: String,
    engine: String,
    source: Arc<str>,
}

impl PlaceholderHandle {
    pub fn new(identifier: &str, engine: &str, source: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            engine: engine.to_string(),
            source: Arc::from(source),
        }
    }

    fn identifier(&mut self) -> String {
        self.identifier.clone()
    }

    fn engine(&mut self) -> String {
        self.engine.clone()
    }

    fn script(&mut self) -> String {
        self.source.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequesterHandle(Requester);

impl RequesterHandle {
    pub fn new(requester: Requester) -> Self {
        Self(requester)
    }

    pub fn requester(&self) -> &Requester {
        &self.0
    }

    fn name(&mut self) -> String {
        self.0.name.clone()
    }

    fn unique_id(&mut self) -> String {
        self.0.unique_id.clone()
    }

    fn is_online(&mut self) -> bool {
        self.0.online
    }
}

/// The host substitution façade, exposed as `PlaceholderAPI`.
#[derive(Clone)]
pub struct HostHandle(Arc<dyn PlaceholderHost>);

impl HostHandle {
    pub fn new(host: Arc<dyn PlaceholderHost>) -> Self {
        Self(host)
    }

    fn set_placeholders(&mut self, requester: RequesterHandle, text: &str) -> String {
        self.0.set_placeholders(Some(requester.requester()), text)
    }

    fn set_placeholders_anonymous(&mut self, _requester: (), text: &str) -> String {
        self.0.set_placeholders(None, text)
    }

    fn set_bracket_placeholders(&mut self, requester: RequesterHandle, text: &str) -> String {
        self.0
            .set_bracket_placeholders(Some(requester.requester()), text)
    }

    fn set_bracket_placeholders_anonymous(&mut self, _requester: (), text: &str) -> String {
        self.0.set_bracket_placeholders(None, text)
    }
}

/// Substitution helper bound to the requester of the current call, exposed
/// as `Parser`.
#[derive(Clone)]
pub struct ParserHandle {
    host: Arc<dyn PlaceholderHost>,
    requester: Option<Requester>,
}

impl ParserHandle {
    pub fn new(host: Arc<dyn PlaceholderHost>, requester: Option<Requester>) -> Self {
        Self { host, requester }
    }

    fn parse(&mut self, text: &str) -> String {
        self.host.set_placeholders(self.requester.as_ref(), text)
    }

    fn parse_bracket(&mut self, text: &str) -> String {
        self.host
            .set_bracket_placeholders(self.requester.as_ref(), text)
    }

    fn parse_relational(&mut self, text: &str, relation: RequesterHandle) -> String {
        self.host.set_relational_placeholders(
            self.requester.as_ref(),
            Some(relation.requester()),
            text,
        )
    }
}

fn read_json(http: &mut HttpUtility, url: &str) -> Result<String, Box<EvalAltResult>> {
    http.read_json(url).map_err(|error| {
        Box::new(EvalAltResult::ErrorRuntime(
            Dynamic::from(error.to_string()),
            Position::NONE,
        ))
    })
}

fn requester_to_string(handle: &mut RequesterHandle) -> String {
    handle.0.name.clone()
}

/// Teaches `engine` every host type a script may receive.
pub fn register_host_api(engine: &mut Engine) {
    engine
        .register_type_with_name::<DataHandle>("Data")
        .register_fn("get", DataHandle::get)
        .register_fn("set", DataHandle::set)
        .register_fn("setIfAbsent", DataHandle::set_if_absent)
        .register_fn("setIfNull", DataHandle::set_if_absent)
        .register_fn("remove", DataHandle::remove)
        .register_fn("clear", DataHandle::clear)
        .register_fn("exists", DataHandle::exists)
        .register_fn("isEmpty", DataHandle::is_empty)
        .register_fn("getTemp", DataHandle::get_temp)
        .register_fn("setTemp", DataHandle::set_temp)
        .register_fn("setTempIfAbsent", DataHandle::set_temp_if_absent)
        .register_fn("removeTemp", DataHandle::remove_temp)
        .register_fn("clearTemp", DataHandle::clear_temp)
        .register_fn("existsTemp", DataHandle::exists_temp)
        .register_fn("isTempEmpty", DataHandle::is_temp_empty);

    engine
        .register_type_with_name::<ExpansionHandle>("Expansion")
        .register_fn("version", ExpansionHandle::version)
        .register_fn("dataFolder", ExpansionHandle::data_folder)
        .register_fn("argumentSplit", ExpansionHandle::argument_split)
        .register_fn("debug", ExpansionHandle::debug);

    engine
        .register_type_with_name::<PlaceholderHandle>("Placeholder")
        .register_fn("identifier", PlaceholderHandle::identifier)
        .register_fn("engine", PlaceholderHandle::engine)
        .register_fn("script", PlaceholderHandle::script);

    engine
        .register_type_with_name::<RequesterHandle>("Requester")
        .register_fn("name", RequesterHandle::name)
        .register_fn("uniqueId", RequesterHandle::unique_id)
        .register_fn("isOnline", RequesterHandle::is_online)
        .register_fn("to_string", requester_to_string)
        .register_fn("to_debug", requester_to_string);

    engine
        .register_type_with_name::<HostHandle>("PlaceholderAPI")
        .register_fn("setPlaceholders", HostHandle::set_placeholders)
        .register_fn("setPlaceholders", HostHandle::set_placeholders_anonymous)
        .register_fn("setBracketPlaceholders", HostHandle::set_bracket_placeholders)
        .register_fn(
            "setBracketPlaceholders",
            HostHandle::set_bracket_placeholders_anonymous,
        );

    engine
        .register_type_with_name::<ParserHandle>("Parser")
        .register_fn("parse", ParserHandle::parse)
        .register_fn("parseBracket", ParserHandle::parse_bracket)
        .register_fn("parseRelational", ParserHandle::parse_relational);

    engine
        .register_type_with_name::<HttpUtility>("UtilityParser")
        .register_fn("readJSON", read_json);
}
