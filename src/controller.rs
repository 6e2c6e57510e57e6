//! Controller Module
//!
//! `DbController` holds the configuration, a lazily opened connection and the
//! current statement, and exposes them as a fluent prepare/bind/execute/fetch
//! sequence.
//!
//! ## Failure reporting
//!
//! Driver failures are returned as `NanoDbError::Connection` or
//! `NanoDbError::Operation`. With debug mode on, the driver's message is kept
//! in the error, stored as [`DbController::last_error`] and logged. With debug
//! mode off only a generic message is logged and the error carries no detail.
//! Connection failures are never returned; they surface as
//! `NanoDbError::NoConnection` on the next statement operation.
//!
//! ## Usage
//!
//! ```
//! use nanodb::{DbController, DbConfig};
//!
//! let config = DbConfig::new()
//!     .with("VERSION", "sqlite")
//!     .with("HOST", "localhost")
//!     .with("NAME", ":memory:")
//!     .with("USERNAME", "root")
//!     .with("PASSWORD", "");
//!
//! let mut db = DbController::new(config)?;
//! db.query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//! db.prepare("INSERT INTO users (name) VALUES (:name)")?
//!     .bind(":name", "Alice")?
//!     .execute()?;
//!
//! let row = db.prepare("SELECT name FROM users WHERE id = :id")?
//!     .bind("id", 1)?
//!     .execute()?
//!     .get_one()?;
//! assert!(row.is_some());
//! # Ok::<(), nanodb::NanoDbError>(())
//! ```

use crate::config::{self, DbConfig};
use crate::core::db::connection;
use crate::core::db::params::{BindSource, ParamType, SharedValue, Value};
use crate::core::db::row::{number_rows, CountResult, NumberedRows, Row};
use crate::core::db::statement::{ErrorInfo, Statement};
use crate::core::{NanoDbError, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, error, warn};

/// Which kind of failure is being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Connection,
    Operation,
}

impl Failure {
    fn generic_message(self) -> &'static str {
        match self {
            Failure::Connection => "database connection error",
            Failure::Operation => "database operation error",
        }
    }

    fn into_error(self, detail: Option<String>) -> NanoDbError {
        match self {
            Failure::Connection => NanoDbError::Connection(detail),
            Failure::Operation => NanoDbError::Operation(detail),
        }
    }
}

/// The message the driver itself reported, without our own prefixes.
fn driver_message(error: &NanoDbError) -> String {
    match error {
        NanoDbError::Database(rusqlite::Error::SqliteFailure(err, message)) => {
            message.clone().unwrap_or_else(|| err.to_string())
        }
        NanoDbError::Database(other) => other.to_string(),
        NanoDbError::Driver(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Connection and statement wrapper over the SQLite driver.
#[derive(Debug, Default)]
pub struct DbController {
    config: DbConfig,
    conn: Option<Connection>,
    stmt: Option<Statement>,
    debug: bool,
    last_error: Option<String>,
}

impl DbController {
    /// Creates a controller from a configuration and connects.
    ///
    /// # Errors
    ///
    /// Returns `NanoDbError::Config` if `VERSION`, `HOST`, `NAME`, `USERNAME`
    /// or `PASSWORD` is missing. A failed connection is not an error here;
    /// check [`DbController::is_connected`].
    pub fn new(config: impl Into<DbConfig>) -> Result<Self> {
        let config = config.into();
        config.validate()?;

        let mut controller = DbController {
            config,
            ..Default::default()
        };
        controller.connect()?;
        Ok(controller)
    }

    /// Like [`DbController::new`], with debug mode set before the first
    /// connection attempt so that its failure is captured in detail.
    pub fn with_debug(config: impl Into<DbConfig>, debug: bool) -> Result<Self> {
        let config = config.into();
        config.validate()?;

        let mut controller = DbController {
            config,
            debug,
            ..Default::default()
        };
        controller.connect()?;
        Ok(controller)
    }

    /// Creates a controller from a TOML configuration file and connects.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(config::load_config(path)?)
    }

    /// Sets one configuration entry. An open connection is left as it is.
    pub fn set_config(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.config.set(key, value);
        self
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Chooses between detailed (on) and generic (off) failure reporting.
    pub fn set_debug(&mut self, debug: bool) -> &mut Self {
        self.debug = debug;
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Opens the connection if it is not open yet.
    ///
    /// Does nothing when a connection already exists or the configuration is
    /// empty. Connection failures are reported according to debug mode and
    /// leave the controller disconnected.
    ///
    /// # Errors
    ///
    /// Returns `NanoDbError::Config` only, when the configuration is not empty
    /// but lacks a required key.
    pub fn connect(&mut self) -> Result<&mut Self> {
        if self.conn.is_some() || self.config.is_empty() {
            return Ok(self);
        }
        self.config.validate()?;

        let dsn = self.config.dsn();
        debug!("Connecting to {}", dsn);
        match connection::open(&dsn, self.config.username(), self.config.password()) {
            Ok(conn) => {
                debug!("Connected to {}", dsn);
                self.conn = Some(conn);
            }
            Err(e) => {
                self.fail(Failure::Connection, e);
            }
        }
        Ok(self)
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// The last driver message captured in debug mode.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn fail(&mut self, failure: Failure, cause: NanoDbError) -> NanoDbError {
        if self.debug {
            let message = driver_message(&cause);
            error!("{}: {}", failure.generic_message(), message);
            self.last_error = Some(message.clone());
            failure.into_error(Some(message))
        } else {
            warn!("{}", failure.generic_message());
            failure.into_error(None)
        }
    }

    fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(NanoDbError::NoConnection)
    }

    fn statement_mut(&mut self) -> Result<&mut Statement> {
        self.stmt.as_mut().ok_or(NanoDbError::NoStatement)
    }

    fn statement(&self) -> Result<&Statement> {
        self.stmt.as_ref().ok_or(NanoDbError::NoStatement)
    }

    /// Compiles `sql` into the current statement, discarding the previous one.
    ///
    /// # Errors
    ///
    /// `NoConnection` without an open connection, `Operation` if the driver
    /// rejects the SQL. Either way no statement is active afterwards.
    pub fn prepare(&mut self, sql: &str) -> Result<&mut Self> {
        self.stmt = None;
        let prepared = Statement::prepare(self.connection()?, sql);
        match prepared {
            Ok(stmt) => {
                self.stmt = Some(stmt);
                Ok(self)
            }
            Err(e) => Err(self.fail(Failure::Operation, e)),
        }
    }

    /// Prepares and immediately executes `sql`, which takes no parameters.
    ///
    /// If execution fails, the statement stays active so that
    /// [`DbController::error_info`] can describe the failure.
    pub fn query(&mut self, sql: &str) -> Result<&mut Self> {
        self.prepare(sql)?.execute()
    }

    /// Binds a value to a placeholder, inferring its type from the value.
    ///
    /// `name` may be written with or without the leading `:`; a number
    /// addresses a positional `?` placeholder.
    pub fn bind(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let value = value.into();
        let param_type = ParamType::infer(&value);
        self.bind_source(name, BindSource::ByValue(value), param_type)
    }

    /// Binds a value to a placeholder as an explicit type.
    pub fn bind_as(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        param_type: ParamType,
    ) -> Result<&mut Self> {
        self.bind_source(name, BindSource::ByValue(value.into()), param_type)
    }

    /// Binds a shared variable to a placeholder. Its value is read each time
    /// the statement executes; its type is inferred from the current value.
    pub fn param(&mut self, name: &str, value: &SharedValue) -> Result<&mut Self> {
        let param_type = ParamType::infer(&value.get());
        self.bind_source(name, BindSource::ByRef(value.clone()), param_type)
    }

    /// Binds a shared variable to a placeholder as an explicit type.
    pub fn param_as(
        &mut self,
        name: &str,
        value: &SharedValue,
        param_type: ParamType,
    ) -> Result<&mut Self> {
        self.bind_source(name, BindSource::ByRef(value.clone()), param_type)
    }

    fn bind_source(
        &mut self,
        name: &str,
        source: BindSource,
        param_type: ParamType,
    ) -> Result<&mut Self> {
        let bound = self.statement_mut()?.bind(name, source, param_type);
        match bound {
            Ok(()) => Ok(self),
            Err(e) => Err(self.fail(Failure::Operation, e)),
        }
    }

    /// Runs the current statement.
    ///
    /// # Errors
    ///
    /// `NoStatement`/`NoConnection` when there is nothing to run, `Operation`
    /// when the driver fails.
    pub fn execute(&mut self) -> Result<&mut Self> {
        let conn = self.conn.as_ref().ok_or(NanoDbError::NoConnection)?;
        let stmt = self.stmt.as_mut().ok_or(NanoDbError::NoStatement)?;

        debug!("Executing: {}", stmt.sql());
        let executed = stmt.execute(conn);
        match executed {
            Ok(()) => Ok(self),
            Err(e) => Err(self.fail(Failure::Operation, e)),
        }
    }

    /// Rows affected by the last execution, or rows it returned for queries.
    pub fn row_count(&self) -> Result<usize> {
        Ok(self.statement()?.row_count())
    }

    /// Number of result columns of the current statement; 0 for statements
    /// that return no rows.
    pub fn column_count(&self) -> Result<usize> {
        Ok(self.statement()?.columns().len())
    }

    /// Fetches the next row, or `None` when there is none.
    pub fn get_one(&mut self) -> Result<Option<Row>> {
        Ok(self.statement_mut()?.fetch_one())
    }

    /// Fetches every remaining row.
    pub fn get_all(&mut self) -> Result<Vec<Row>> {
        Ok(self.statement_mut()?.fetch_all())
    }

    /// Fetches every remaining row as positional values.
    pub fn get_int(&mut self) -> Result<Vec<Vec<Value>>> {
        Ok(self.statement_mut()?.fetch_all_positional())
    }

    /// Reads the first column of the first row as a count.
    ///
    /// When there is no such value (no rows, or a NULL), the positional rows
    /// fetched are returned unchanged as `CountResult::Raw`.
    pub fn get_count(&mut self) -> Result<CountResult> {
        let rows = self.statement_mut()?.fetch_all_positional();
        Ok(CountResult::from_rows(rows))
    }

    /// Fetches every remaining row into a map keyed from 1 in fetch order.
    pub fn get_all_object(&mut self) -> Result<NumberedRows> {
        Ok(number_rows(self.statement_mut()?.fetch_all()))
    }

    /// The row id generated by the most recent insert on this connection.
    pub fn get_last_insert_id(&self) -> Result<String> {
        Ok(self.connection()?.last_insert_rowid().to_string())
    }

    /// Closes the cursor and drops the current statement.
    pub fn free(&mut self) {
        if let Some(mut stmt) = self.stmt.take() {
            stmt.close_cursor();
            debug!("Freed statement: {}", stmt.sql());
        }
    }

    /// Frees the statement, closes the connection and forgets the
    /// configuration, the captured error and the debug flag, leaving the
    /// controller as if it was never configured.
    pub fn close(&mut self) {
        self.free();
        if self.conn.take().is_some() {
            debug!("Closed database connection");
        }
        self.config.clear();
        self.last_error = None;
        self.debug = false;
    }

    /// Error descriptor of the last operation on the current statement.
    pub fn error(&self) -> Result<ErrorInfo> {
        Ok(self.statement()?.error_info().clone())
    }

    /// Same as [`DbController::error`].
    pub fn error_info(&self) -> Result<ErrorInfo> {
        self.error()
    }

    /// Dump of the current statement's SQL and bindings in debug mode;
    /// `None` when debug mode is off.
    pub fn dump_debug(&self) -> Result<Option<String>> {
        if !self.debug {
            return Ok(None);
        }
        Ok(Some(self.statement()?.dump_params()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{memory_config, SampleDatabase};

    #[test]
    fn test_new_connects() {
        let db = DbController::new(memory_config()).unwrap();
        assert!(db.is_connected());
        assert!(db.last_error().is_none());
    }

    #[test]
    fn test_new_missing_key() {
        let mut config = memory_config();
        config.clear();
        config.set("VERSION", "sqlite").set("HOST", "localhost");

        match DbController::new(config) {
            Err(NanoDbError::Config(msg)) => assert!(msg.contains("NAME")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_connect_is_idempotent() {
        let mut db = DbController::new(memory_config()).unwrap();
        db.query("CREATE TABLE t (x INTEGER)").unwrap();

        // A second connection to :memory: would not see the table.
        db.connect().unwrap();
        db.query("SELECT COUNT(*) FROM t").unwrap();
        assert_eq!(db.get_count().unwrap(), CountResult::Count(0));
    }

    #[test]
    fn test_connect_on_unconfigured_is_noop() {
        let mut db = DbController::default();
        db.connect().unwrap();
        assert!(!db.is_connected());
    }

    #[test]
    fn test_connect_with_partial_config() {
        let mut db = DbController::default();
        db.set_config("VERSION", "sqlite");
        assert!(matches!(db.connect(), Err(NanoDbError::Config(_))));
    }

    #[test]
    fn test_set_config_then_connect() {
        let mut db = DbController::default();
        db.set_config("VERSION", "sqlite")
            .set_config("HOST", "localhost")
            .set_config("NAME", ":memory:")
            .set_config("USERNAME", "root")
            .set_config("PASSWORD", "");
        assert!(!db.is_connected());

        db.connect().unwrap();
        assert!(db.is_connected());
    }

    #[test]
    fn test_connection_failure_debug_off() {
        let mut config = memory_config();
        config.set("VERSION", "mysql");
        let db = DbController::new(config).unwrap();

        assert!(!db.is_connected());
        assert!(db.last_error().is_none());
    }

    #[test]
    fn test_connection_failure_debug_on() {
        let mut config = memory_config();
        config.set("VERSION", "mysql");
        let db = DbController::with_debug(config, true).unwrap();

        assert!(!db.is_connected());
        assert_eq!(db.last_error(), Some("could not find driver"));
    }

    #[test]
    fn test_execute_failure_debug_off() {
        let sample = SampleDatabase::new();
        let mut db = sample.controller();
        db.prepare("INSERT INTO users (name, email) VALUES (:name, :email)")
            .unwrap()
            .bind("name", "Dup")
            .unwrap()
            .bind("email", "alice@example.com")
            .unwrap();

        match db.execute() {
            Err(err @ NanoDbError::Operation(None)) => {
                assert_eq!(err.to_string(), "database operation error")
            }
            _ => panic!("Expected generic Operation error"),
        }
        assert!(db.last_error().is_none());
        assert_eq!(db.error().unwrap().sqlstate, "23000");
    }

    #[test]
    fn test_execute_failure_debug_on() {
        let sample = SampleDatabase::new();
        let mut db = sample.controller();
        db.set_debug(true);
        db.prepare("INSERT INTO users (name, email) VALUES (:name, :email)")
            .unwrap()
            .bind("name", "Dup")
            .unwrap()
            .bind("email", "alice@example.com")
            .unwrap();

        let err = db.execute().err().unwrap();
        let detail = err.detail().unwrap().to_string();
        assert!(detail.contains("UNIQUE constraint failed"));
        assert_eq!(db.last_error(), Some(detail.as_str()));
    }

    #[test]
    fn test_prepare_without_connection() {
        let mut db = DbController::default();
        assert!(matches!(db.prepare("SELECT 1"), Err(NanoDbError::NoConnection)));
    }

    #[test]
    fn test_prepare_failure_clears_statement() {
        let mut db = DbController::new(memory_config()).unwrap();
        db.query("SELECT 1").unwrap();
        assert!(db.prepare("SELECT * FROM missing_table").is_err());
        assert!(matches!(db.row_count(), Err(NanoDbError::NoStatement)));
    }

    #[test]
    fn test_bind_without_statement() {
        let mut db = DbController::new(memory_config()).unwrap();
        assert!(matches!(db.bind("id", 1), Err(NanoDbError::NoStatement)));
    }

    #[test]
    fn test_dump_debug() {
        let sample = SampleDatabase::new();
        let mut db = sample.controller();
        db.prepare("SELECT id FROM users WHERE id = :id").unwrap().bind("id", 1).unwrap();
        assert_eq!(db.dump_debug().unwrap(), None);

        db.set_debug(true);
        let dump = db.dump_debug().unwrap().unwrap();
        assert!(dump.contains("Key: Name: [3] :id"));
    }

    #[test]
    fn test_free_and_close() {
        let mut db = DbController::new(memory_config()).unwrap();
        db.query("SELECT 1").unwrap();
        db.free();
        db.free();
        assert!(matches!(db.get_all(), Err(NanoDbError::NoStatement)));

        db.close();
        assert!(!db.is_connected());
        assert!(db.config().is_empty());
    }

    #[test]
    fn test_free_and_close_without_handles_are_noops() {
        let mut db = DbController::default();
        db.free();
        db.close();
        assert!(!db.is_connected());

        let mut db = DbController::new(memory_config()).unwrap();
        db.free();
        assert!(db.is_connected());
        db.close();
        db.close();
        assert!(!db.is_connected());
    }
}
