/// Row Module
///
/// The shapes fetched rows are returned in.

use crate::core::db::params::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A fetched row with named fields, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Row { columns, values }
    }

    /// Looks up a field by column name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Rows keyed by their 1-based fetch position.
pub type NumberedRows = BTreeMap<usize, Row>;

/// Builds a [`NumberedRows`] container; the first row gets key 1.
pub fn number_rows(rows: impl IntoIterator<Item = Row>) -> NumberedRows {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| (i + 1, row))
        .collect()
}

/// Result of a count fetch.
///
/// A count is only produced when the first row has a non-NULL first column;
/// otherwise the positional rows that were fetched are handed back as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum CountResult {
    Count(i64),
    Raw(Vec<Vec<Value>>),
}

impl CountResult {
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Self {
        let count = rows
            .first()
            .and_then(|row| row.first())
            .filter(|value| !value.is_null())
            .map(Value::to_integer);
        match count {
            Some(n) => CountResult::Count(n),
            None => CountResult::Raw(rows),
        }
    }

    pub fn count(&self) -> Option<i64> {
        match self {
            CountResult::Count(n) => Some(*n),
            CountResult::Raw(_) => None,
        }
    }
}
