pub mod data;
pub mod error;
pub mod types;
pub mod value;

pub use data::ScriptData;
pub use error::PlaceholderError;
pub use types::*;
pub use value::*;
