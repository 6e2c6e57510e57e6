/// Database Module
///
/// This module provides the database layer that `DbController` delegates to,
/// organized into focused submodules.
///
/// ## Architecture
///
/// - **Connection** (`connection.rs`): DSN handling and opening a driver connection
/// - **Parameters** (`params.rs`): Values, parameter types, inference and coercion
/// - **Statements** (`statement.rs`): Preparing, binding, executing and the result cursor
/// - **Rows** (`row.rs`): Fetched record shapes
///
/// ## Error Handling
///
/// Functions here return raw `NanoDbError::Database`/`Driver` errors. The
/// debug/generic reporting policy is applied one level up, in the controller.
pub mod connection;
pub mod params;
pub mod row;
pub mod statement;

pub use connection::*;
pub use params::*;
pub use row::*;
pub use statement::*;
