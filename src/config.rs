use crate::core::db::connection::Dsn;
use crate::core::{NanoDbError, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

pub const VERSION: &str = "VERSION";
pub const HOST: &str = "HOST";
pub const PORT: &str = "PORT";
pub const NAME: &str = "NAME";
pub const USERNAME: &str = "USERNAME";
pub const PASSWORD: &str = "PASSWORD";

/// Keys that must be present before a connection is attempted. `PORT` is optional.
pub const REQUIRED_KEYS: [&str; 5] = [VERSION, HOST, NAME, USERNAME, PASSWORD];

/// Connection settings keyed by `VERSION`, `HOST`, `PORT`, `NAME`,
/// `USERNAME` and `PASSWORD`.
///
/// Values are kept as strings; scalars are rendered when they are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbConfig {
    entries: BTreeMap<String, String>,
}

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one entry, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.entries.insert(key.into(), value.to_string());
        self
    }

    /// Builder-style variant of [`DbConfig::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Fails on the first required key that is absent.
    pub fn validate(&self) -> Result<()> {
        match REQUIRED_KEYS.iter().find(|key| !self.entries.contains_key(**key)) {
            Some(key) => Err(NanoDbError::Config(format!(
                "Missing required configuration key: {}",
                key
            ))),
            None => Ok(()),
        }
    }

    /// The connection string for these settings. An absent `PORT` renders empty.
    pub fn dsn(&self) -> Dsn {
        Dsn::new(
            self.get(VERSION).unwrap_or_default(),
            self.get(HOST).unwrap_or_default(),
            self.get(PORT).unwrap_or_default(),
            self.get(NAME).unwrap_or_default(),
        )
    }

    pub fn username(&self) -> &str {
        self.get(USERNAME).unwrap_or_default()
    }

    pub fn password(&self) -> &str {
        self.get(PASSWORD).unwrap_or_default()
    }

    /// Parses settings from TOML text with the keys at the top level.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::value::Table =
            toml::from_str(content).map_err(|e| NanoDbError::Config(e.to_string()))?;

        let mut config = DbConfig::new();
        for (key, value) in table {
            let value = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                other => {
                    return Err(NanoDbError::Config(format!(
                        "Configuration key {} must be a scalar, found {}",
                        key,
                        other.type_str()
                    )))
                }
            };
            config.entries.insert(key, value);
        }
        Ok(config)
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = nanodb::config::load_config("database.toml").expect("Failed to load config");
/// println!("{}", config.dsn());
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DbConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| NanoDbError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    DbConfig::from_toml_str(&content)
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for DbConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = DbConfig::new();
        for (key, value) in iter {
            config.set(key, value);
        }
        config
    }
}

impl<K: Into<String>, V: ToString> From<HashMap<K, V>> for DbConfig {
    fn from(map: HashMap<K, V>) -> Self {
        map.into_iter().collect()
    }
}

impl<K: Into<String>, V: ToString> From<BTreeMap<K, V>> for DbConfig {
    fn from(map: BTreeMap<K, V>) -> Self {
        map.into_iter().collect()
    }
}

impl<K: Into<String>, V: ToString, const N: usize> From<[(K, V); N]> for DbConfig {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}
