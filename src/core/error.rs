/// nanodb Error Module
///
/// This module defines the error types for the nanodb wrapper.
/// Driver failures are reported through `Connection` and `Operation`,
/// which only carry the driver's message when debug mode is enabled.
use thiserror::Error;

/// Error type for every fallible nanodb operation.
///
/// This enum covers:
/// - Configuration validation and loading
/// - Connection and statement failures surfaced by the driver
/// - Calls made without an open connection or an active statement
#[derive(Error, Debug)]
pub enum NanoDbError {
    /// Missing required keys, unreadable or malformed configuration files
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection could not be established; detail is present in debug mode only
    #[error("database connection error{}", fmt_detail(.0))]
    Connection(Option<String>),

    /// Statement preparation, binding or execution failed; detail is present in debug mode only
    #[error("database operation error{}", fmt_detail(.0))]
    Operation(Option<String>),

    /// A statement operation was attempted without an open connection
    #[error("no open database connection")]
    NoConnection,

    /// A statement operation was attempted after `free`/`close` or before `prepare`
    #[error("no active statement")]
    NoStatement,

    /// Driver-level failures not raised by SQLite itself: unsupported driver,
    /// malformed DSN, undeclared placeholder
    #[error("Driver error: {0}")]
    Driver(String),

    /// Raw errors from the SQLite driver
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn fmt_detail(message: &Option<String>) -> String {
    match message {
        Some(message) => format!(": {}", message),
        None => String::new(),
    }
}

impl NanoDbError {
    /// Returns the driver message carried by a connection or operation failure.
    pub fn detail(&self) -> Option<&str> {
        match self {
            NanoDbError::Connection(detail) | NanoDbError::Operation(detail) => detail.as_deref(),
            _ => None,
        }
    }
}

/// Type alias for Result to use NanoDbError as the error type.
pub type Result<T> = std::result::Result<T, NanoDbError>;
