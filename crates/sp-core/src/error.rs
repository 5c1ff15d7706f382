use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct PlaceholderError {
    pub code: String,
    pub message: String,
}

impl PlaceholderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new("BINDING_INVALID_ARGUMENT", message)
    }
}

pub fn map_error(code: &'static str, error: impl Display) -> PlaceholderError {
    PlaceholderError::new(code, error.to_string())
}
