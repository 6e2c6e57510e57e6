/// Statement Module
///
/// A prepared statement as the wrapper sees it: the SQL text, the placeholders
/// the driver reported when compiling it, the bindings made so far, and after
/// execution a forward-only cursor over the result rows.
///
/// The compiled driver statement itself lives in the connection's statement
/// cache and is looked up again on every execution, so a `Statement` never
/// borrows the connection.

use crate::core::db::params::{BindSource, Binding, ParamType, Value};
use crate::core::db::row::Row;
use crate::core::{NanoDbError, Result};
use rusqlite::{Connection, ErrorCode};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::trace;

/// SQLSTATE reported after a successful execution.
pub const SQLSTATE_OK: &str = "00000";
/// SQLSTATE reported for constraint violations.
pub const SQLSTATE_CONSTRAINT: &str = "23000";
/// SQLSTATE reported for every other driver failure.
pub const SQLSTATE_GENERAL: &str = "HY000";

/// Structured error descriptor of the last operation on a statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Empty until the statement has run
    pub sqlstate: String,
    /// Driver-specific (extended) result code
    pub code: Option<i32>,
    pub message: Option<String>,
}

impl ErrorInfo {
    pub fn success() -> Self {
        ErrorInfo {
            sqlstate: SQLSTATE_OK.to_string(),
            code: None,
            message: None,
        }
    }

    pub fn from_error(error: &NanoDbError) -> Self {
        match error {
            NanoDbError::Database(rusqlite::Error::SqliteFailure(err, message)) => ErrorInfo {
                sqlstate: if err.code == ErrorCode::ConstraintViolation {
                    SQLSTATE_CONSTRAINT.to_string()
                } else {
                    SQLSTATE_GENERAL.to_string()
                },
                code: Some(err.extended_code),
                message: Some(message.clone().unwrap_or_else(|| err.to_string())),
            },
            NanoDbError::Database(other) => ErrorInfo {
                sqlstate: SQLSTATE_GENERAL.to_string(),
                code: None,
                message: Some(other.to_string()),
            },
            other => ErrorInfo {
                sqlstate: SQLSTATE_GENERAL.to_string(),
                code: None,
                message: Some(other.to_string()),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.sqlstate == SQLSTATE_OK
    }
}

fn column_names(stmt: &rusqlite::Statement<'_>) -> Arc<[String]> {
    stmt.column_names()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>()
        .into()
}

#[derive(Debug)]
struct ResultCursor {
    columns: Arc<[String]>,
    rows: VecDeque<Vec<Value>>,
}

#[derive(Debug)]
pub struct Statement {
    sql: String,
    /// Placeholder names by position; `None` for anonymous `?`
    placeholders: Vec<Option<String>>,
    columns: Arc<[String]>,
    bindings: BTreeMap<usize, Binding>,
    cursor: Option<ResultCursor>,
    row_count: usize,
    error_info: ErrorInfo,
}

impl Statement {
    /// Compiles `sql` on `conn` and records its placeholders.
    pub fn prepare(conn: &Connection, sql: &str) -> Result<Self> {
        let stmt = conn.prepare_cached(sql)?;
        let placeholders = (1..=stmt.parameter_count())
            .map(|i| stmt.parameter_name(i).map(str::to_string))
            .collect();
        let columns = column_names(&stmt);

        trace!("Prepared statement: {}", sql);
        Ok(Statement {
            sql: sql.to_string(),
            placeholders,
            columns,
            bindings: BTreeMap::new(),
            cursor: None,
            row_count: 0,
            error_info: ErrorInfo::default(),
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Result column names; empty for statements that return no rows.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn parameter_count(&self) -> usize {
        self.placeholders.len()
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.values()
    }

    /// Maps a caller-supplied placeholder name to its 1-based index and
    /// canonical name. Digits address positional placeholders; a missing
    /// `:` prefix is added.
    fn placeholder(&self, name: &str) -> Option<(usize, String)> {
        if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
            let index: usize = name.parse().ok()?;
            return (1..=self.placeholders.len())
                .contains(&index)
                .then(|| (index, index.to_string()));
        }

        let canonical = if name.starts_with(&[':', '@', '$', '?'][..]) {
            name.to_string()
        } else {
            format!(":{}", name)
        };
        self.placeholders
            .iter()
            .position(|p| p.as_deref() == Some(canonical.as_str()))
            .map(|i| (i + 1, canonical))
    }

    /// Binds `source` to the placeholder `name`, replacing an earlier binding.
    pub fn bind(&mut self, name: &str, source: BindSource, param_type: ParamType) -> Result<()> {
        let (index, name) = self
            .placeholder(name)
            .ok_or_else(|| NanoDbError::Driver(format!("parameter was not defined: {}", name)))?;

        self.bindings.insert(
            index,
            Binding {
                index,
                name,
                param_type,
                source,
            },
        );
        Ok(())
    }

    /// Runs the statement and materializes its result rows into the cursor.
    /// Placeholders without a binding are sent as NULL.
    pub fn execute(&mut self, conn: &Connection) -> Result<()> {
        let result = self.run(conn);
        self.error_info = match &result {
            Ok(()) => ErrorInfo::success(),
            Err(e) => ErrorInfo::from_error(e),
        };
        result
    }

    fn run(&mut self, conn: &Connection) -> Result<()> {
        self.cursor = None;
        self.row_count = 0;

        let mut stmt = conn.prepare_cached(&self.sql)?;
        for index in 1..=self.placeholders.len() {
            let value = self
                .bindings
                .get(&index)
                .map(Binding::resolve)
                .unwrap_or(Value::Null);
            stmt.raw_bind_parameter(index, value.into_sql())?;
        }

        self.columns = column_names(&stmt);
        let column_count = self.columns.len();
        if column_count == 0 {
            self.row_count = stmt.raw_execute()?;
            self.cursor = Some(ResultCursor {
                columns: Arc::clone(&self.columns),
                rows: VecDeque::new(),
            });
            return Ok(());
        }

        let mut fetched = VecDeque::new();
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let values = (0..column_count)
                .map(|i| row.get_ref(i).map(Value::from_sql))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            fetched.push_back(values);
        }

        trace!("Statement returned {} rows", fetched.len());
        self.row_count = fetched.len();
        self.cursor = Some(ResultCursor {
            columns: Arc::clone(&self.columns),
            rows: fetched,
        });
        Ok(())
    }

    /// Rows affected by the last execution, or rows it returned for queries.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn error_info(&self) -> &ErrorInfo {
        &self.error_info
    }

    /// Takes the next row from the cursor.
    pub fn fetch_one(&mut self) -> Option<Row> {
        let cursor = self.cursor.as_mut()?;
        let values = cursor.rows.pop_front()?;
        Some(Row::new(Arc::clone(&cursor.columns), values))
    }

    /// Takes every remaining row from the cursor.
    pub fn fetch_all(&mut self) -> Vec<Row> {
        match self.cursor.as_mut() {
            Some(cursor) => {
                let columns = Arc::clone(&cursor.columns);
                cursor
                    .rows
                    .drain(..)
                    .map(|values| Row::new(Arc::clone(&columns), values))
                    .collect()
            }
            None => Vec::new(),
        }
    }

    /// Takes every remaining row from the cursor as positional values.
    pub fn fetch_all_positional(&mut self) -> Vec<Vec<Value>> {
        match self.cursor.as_mut() {
            Some(cursor) => cursor.rows.drain(..).collect(),
            None => Vec::new(),
        }
    }

    /// Discards any unread rows.
    pub fn close_cursor(&mut self) {
        self.cursor = None;
    }

    /// Renders the SQL text and bindings in the native client's dump format.
    pub fn dump_params(&self) -> String {
        let mut out = format!(
            "SQL: [{}] {}\nParams:  {}\n",
            self.sql.len(),
            self.sql,
            self.bindings.len()
        );
        for binding in self.bindings.values() {
            let positional = binding.name.bytes().all(|b| b.is_ascii_digit());
            let key = if positional {
                let position = binding.index - 1;
                format!("Key: Position #{}:\nparamno={}\nname=[0] \"\"\n", position, position)
            } else {
                let len = binding.name.len();
                format!(
                    "Key: Name: [{}] {}\nparamno=-1\nname=[{}] \"{}\"\n",
                    len, binding.name, len, binding.name
                )
            };
            out.push_str(&key);
            out.push_str(&format!("is_param=1\nparam_type={}\n", binding.param_type.code()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::params::SharedValue;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                active BOOLEAN
            );
            INSERT INTO users (name, active) VALUES ('Alice', 1);
            INSERT INTO users (name, active) VALUES ('Bob', 0);
        ",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_prepare_records_placeholders() {
        let conn = setup();
        let stmt = Statement::prepare(&conn, "SELECT * FROM users WHERE id = :id AND name = ?2").unwrap();
        assert_eq!(stmt.parameter_count(), 2);
        assert!(stmt.placeholder("id").is_some());
        assert!(stmt.placeholder(":id").is_some());
        assert_eq!(stmt.placeholder("2"), Some((2, "2".to_string())));
        assert_eq!(stmt.placeholder("3"), None);
        assert_eq!(stmt.placeholder(":missing"), None);
    }

    #[test]
    fn test_prepare_invalid_sql() {
        let conn = setup();
        let result = Statement::prepare(&conn, "SELEC id FROM users");
        assert!(matches!(result, Err(NanoDbError::Database(_))));
    }

    #[test]
    fn test_execute_and_fetch() {
        let conn = setup();
        let mut stmt = Statement::prepare(&conn, "SELECT id, name FROM users ORDER BY id").unwrap();
        assert_eq!(stmt.error_info().sqlstate, "");
        stmt.execute(&conn).unwrap();

        assert_eq!(stmt.columns(), ["id", "name"]);
        assert_eq!(stmt.row_count(), 2);
        assert!(stmt.error_info().is_success());

        let first = stmt.fetch_one().unwrap();
        assert_eq!(first.get("name"), Some(&Value::Text("Alice".into())));

        let rest = stmt.fetch_all();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].get("id"), Some(&Value::Integer(2)));
        assert!(stmt.fetch_one().is_none());
    }

    #[test]
    fn test_bind_unknown_placeholder() {
        let conn = setup();
        let mut stmt = Statement::prepare(&conn, "SELECT * FROM users WHERE id = :id").unwrap();
        let result = stmt.bind(":nope", BindSource::ByValue(Value::Integer(1)), ParamType::Int);
        match result {
            Err(NanoDbError::Driver(msg)) => assert!(msg.contains("parameter was not defined")),
            _ => panic!("Expected Driver error"),
        }
    }

    #[test]
    fn test_dml_row_count() {
        let conn = setup();
        let mut stmt = Statement::prepare(&conn, "UPDATE users SET active = :active").unwrap();
        stmt.bind("active", BindSource::ByValue(Value::Boolean(true)), ParamType::Bool)
            .unwrap();
        stmt.execute(&conn).unwrap();
        assert_eq!(stmt.row_count(), 2);
        assert!(stmt.fetch_all().is_empty());
    }

    #[test]
    fn test_constraint_violation_error_info() {
        let conn = setup();
        let mut stmt = Statement::prepare(&conn, "INSERT INTO users (name) VALUES (:name)").unwrap();
        stmt.bind(":name", BindSource::ByValue(Value::Text("Alice".into())), ParamType::Str)
            .unwrap();
        assert!(stmt.execute(&conn).is_err());

        let info = stmt.error_info();
        assert_eq!(info.sqlstate, SQLSTATE_CONSTRAINT);
        assert!(info.code.is_some());
        assert!(info.message.as_deref().unwrap_or_default().contains("UNIQUE"));
    }

    #[test]
    fn test_by_ref_binding_reexecution() {
        let conn = setup();
        let name = SharedValue::new("Carol");
        let mut stmt = Statement::prepare(&conn, "INSERT INTO users (name) VALUES (:name)").unwrap();
        stmt.bind(":name", BindSource::ByRef(name.clone()), ParamType::Str).unwrap();

        stmt.execute(&conn).unwrap();
        name.set("Dave");
        stmt.execute(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users WHERE name IN ('Carol', 'Dave')", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_dump_params() {
        let conn = setup();
        let mut stmt = Statement::prepare(&conn, "SELECT id FROM users WHERE id = :id").unwrap();
        stmt.bind("id", BindSource::ByValue(Value::Integer(1)), ParamType::Int).unwrap();

        let dump = stmt.dump_params();
        assert!(dump.starts_with("SQL: [35] SELECT id FROM users WHERE id = :id\n"));
        assert!(dump.contains("Params:  1\n"));
        assert!(dump.contains("Key: Name: [3] :id\n"));
        assert!(dump.contains("param_type=1\n"));
    }

    #[test]
    fn test_dump_params_positional() {
        let conn = setup();
        let mut stmt = Statement::prepare(&conn, "SELECT id FROM users WHERE id = ? AND name = ?").unwrap();
        stmt.bind("2", BindSource::ByValue(Value::from("Alice")), ParamType::Str).unwrap();

        let dump = stmt.dump_params();
        assert!(dump.contains("Params:  1\n"));
        assert!(dump.contains("Key: Position #1:\nparamno=1\nname=[0] \"\"\nis_param=1\nparam_type=2\n"));
        assert!(!dump.contains("Key: Name:"));
    }

    #[test]
    fn test_fetch_before_execute_is_empty() {
        let conn = setup();
        let mut stmt = Statement::prepare(&conn, "SELECT id FROM users").unwrap();
        assert_eq!(stmt.row_count(), 0);
        assert!(stmt.fetch_one().is_none());
        assert!(stmt.fetch_all_positional().is_empty());
    }
}
