/// Connection Module
///
/// DSN handling and opening a connection through the driver named by the DSN.

use crate::core::{NanoDbError, Result};
use rusqlite::Connection;
use std::fmt;
use tracing::debug;

/// Driver identifier served by the bundled SQLite client.
pub const SQLITE_DRIVER: &str = "sqlite";

/// A parsed `driver:host=...;port=...;dbname=...` connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    pub driver: String,
    pub host: String,
    pub port: String,
    pub dbname: String,
}

impl Dsn {
    pub fn new(
        driver: impl Into<String>,
        host: impl Into<String>,
        port: impl Into<String>,
        dbname: impl Into<String>,
    ) -> Self {
        Dsn {
            driver: driver.into(),
            host: host.into(),
            port: port.into(),
            dbname: dbname.into(),
        }
    }

    /// Parses a DSN string. Unknown `key=value` pairs are ignored.
    pub fn parse(dsn: &str) -> Result<Self> {
        let (driver, rest) = dsn
            .split_once(':')
            .ok_or_else(|| NanoDbError::Driver(format!("invalid data source name: {}", dsn)))?;
        if driver.is_empty() {
            return Err(NanoDbError::Driver(format!("invalid data source name: {}", dsn)));
        }

        let mut parsed = Dsn::new(driver, "", "", "");
        for pair in rest.split(';').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key.trim() {
                "host" => parsed.host = value.to_string(),
                "port" => parsed.port = value.to_string(),
                "dbname" => parsed.dbname = value.to_string(),
                _ => {}
            }
        }
        Ok(parsed)
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:host={};port={};dbname={}",
            self.driver, self.host, self.port, self.dbname
        )
    }
}

/// Opens a connection for `dsn` with the given credentials.
///
/// Only the SQLite driver is available. It opens `dbname` as a file path
/// (`:memory:` for an in-memory database); host, port and credentials have
/// no meaning for it. Any other driver fails the way the native client does
/// when the driver is not installed.
pub fn open(dsn: &Dsn, username: &str, _password: &str) -> Result<Connection> {
    if !dsn.driver.eq_ignore_ascii_case(SQLITE_DRIVER) {
        return Err(NanoDbError::Driver("could not find driver".to_string()));
    }
    if dsn.dbname.is_empty() {
        return Err(NanoDbError::Driver("no database name given".to_string()));
    }

    debug!("Opening {} database {:?} as {:?}", dsn.driver, dsn.dbname, username);
    let conn = if dsn.dbname == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(&dsn.dbname)?
    };

    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}
