//! Common error types for lector

use thiserror::Error;

/// Common result type for lector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the lector crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration could not be parsed
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Text has no split point within the per-request character budget
    #[error("Text too long: no split point within {budget} characters")]
    TextTooLong {
        /// Character budget that could not be honoured
        budget: usize,
    },

    /// Invalid user input or parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
