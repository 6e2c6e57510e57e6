/// Core Module for nanodb
///
/// Shared infrastructure for the wrapper: the error type and the
/// database layer built on top of the SQLite driver.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{NanoDbError, Result};
