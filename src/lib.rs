// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod controller;

#[cfg(test)]
mod test_utils;

pub use config::{load_config, DbConfig};
pub use controller::DbController;
pub use crate::core::db::{
    BindSource, CountResult, Dsn, ErrorInfo, NumberedRows, ParamType, Row, SharedValue, Value,
};
pub use crate::core::{NanoDbError, Result};
