mod binding;
mod bridge;
mod context;
mod data_file;
mod engines;
mod handles;
mod host;
mod http;

pub use binding::{EvalFault, ScriptBinding};
pub use bridge::{dynamic_to_value, value_to_dynamic};
pub use context::{AppContext, EvalContext};
pub use data_file::DataDocument;
pub use engines::{EngineFactory, EngineRegistry, DEFAULT_ENGINE};
pub use handles::{
    register_host_api, DataHandle, ExpansionHandle, HostHandle, ParserHandle, PlaceholderHandle,
    RequesterHandle,
};
pub use host::{PlaceholderHost, SimpleHost};
pub use http::{json_or_empty, HttpUtility};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
