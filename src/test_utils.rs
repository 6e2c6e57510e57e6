/// # Test Utilities Module
///
/// Fixtures shared by the unit tests:
/// - Configurations for in-memory and on-disk SQLite databases
/// - A sample database file with a populated `users` table
/// - Assertion helpers for `NanoDbError` variants

use crate::config::DbConfig;
use crate::controller::DbController;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Configuration for a private in-memory SQLite database.
pub fn memory_config() -> DbConfig {
    sqlite_config(":memory:")
}

/// Configuration for a SQLite database stored at `path`.
pub fn sqlite_config(path: impl AsRef<Path>) -> DbConfig {
    DbConfig::new()
        .with("VERSION", "sqlite")
        .with("HOST", "localhost")
        .with("NAME", path.as_ref().display())
        .with("USERNAME", "root")
        .with("PASSWORD", "")
}

/// A database file in a temporary directory, removed on drop.
pub struct SampleDatabase {
    _dir: TempDir,
    pub path: PathBuf,
}

impl SampleDatabase {
    /// Creates the standard schema with three users.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("sample.db");

        let conn = Connection::open(&path).expect("Failed to create sample database");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                age INTEGER,
                active BOOLEAN DEFAULT 1
            );
            INSERT INTO users (name, email, age) VALUES ('Alice', 'alice@example.com', 28);
            INSERT INTO users (name, email, age) VALUES ('Bob', 'bob@example.com', 32);
            INSERT INTO users (name, email, age) VALUES ('Charlie', 'charlie@example.com', NULL);
        ",
        )
        .expect("Failed to populate sample database");

        SampleDatabase { _dir: dir, path }
    }

    pub fn config(&self) -> DbConfig {
        sqlite_config(&self.path)
    }

    /// A connected controller for this database.
    pub fn controller(&self) -> DbController {
        let db = DbController::new(self.config()).expect("Failed to configure controller");
        assert!(db.is_connected(), "Sample database should be reachable");
        db
    }
}

/// Asserts that a result is the given `NanoDbError` variant
macro_rules! assert_nanodb_error {
    ($result:expr, $variant:pat, $context:expr) => {
        match $result {
            Err($variant) => {}
            Ok(_) => panic!("Expected {} but got Ok in {}", stringify!($variant), $context),
            Err(other) => panic!("Expected {} but got {:?} in {}", stringify!($variant), other, $context),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NanoDbError;

    #[test]
    fn test_sample_database_fixture() {
        let sample = SampleDatabase::new();
        let mut db = sample.controller();
        db.query("SELECT COUNT(*) FROM users").unwrap();
        assert_eq!(db.get_count().unwrap().count(), Some(3));
    }

    #[test]
    fn test_error_assertion_macro() {
        let mut db = DbController::default();
        assert_nanodb_error!(db.prepare("SELECT 1"), NanoDbError::NoConnection, "unconfigured controller");
    }
}
