//! Error types for the query compiler and execution core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, JournalError>;

#[derive(Error, Debug)]
pub enum JournalError {
    /// Malformed query text. `position` is the 0-based byte offset of the
    /// offending token within the parsed string.
    #[error("{message} at position {position}")]
    Parse { position: usize, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Reverse lookup of a symbol key that was never committed.
    #[error("Invalid symbol key: {0}")]
    InvalidSymbolKey(i32),

    /// Strict forward lookup (`SymbolTable::get`) of an unknown value.
    #[error("Invalid value '{value}' for symbol {column}")]
    InvalidSymbolValue { column: String, value: String },

    /// Storage failure surfaced while iterating a row cursor. The original
    /// cause is rendered into the message; the cursor is dead after this.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl JournalError {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        JournalError::Parse {
            position,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        JournalError::Configuration(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        JournalError::Storage(message.into())
    }
}
