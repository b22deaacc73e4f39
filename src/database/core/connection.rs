//! Connection providers
//!
//! A [`ConnectionProvider`] turns a [`ConnectionConfig`] into an open SQLite
//! connection. [`SqliteProvider`] is the default backend; tests and embedders
//! can supply their own provider to the connection manager.

use crate::error::{DataError, DataResult};
use rusqlite::Connection;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Name of the connection used when none is configured
pub const DEFAULT_CONNECTION: &str = "default";

/// Database identifier that opens a private in-memory database
pub const IN_MEMORY: &str = ":memory:";

/// Settings for a single named connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// Path to the database file, or `:memory:`
    pub database: Option<String>,

    /// Journal mode pragma, `WAL` unless set
    #[serde(default)]
    pub journal_mode: Option<String>,

    /// Whether `PRAGMA foreign_keys=ON` is issued, on unless set
    #[serde(default)]
    pub foreign_keys: Option<bool>,
}

impl ConnectionConfig {
    pub fn new(database: &str) -> Self {
        Self {
            database: Some(database.to_string()),
            ..Default::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY)
    }

    /// The database identifier; a missing key is a configuration error.
    pub fn database(&self) -> DataResult<&str> {
        self.database
            .as_deref()
            .ok_or_else(|| DataError::MissingConfig("database".to_string()))
    }
}

/// The table of named connections plus the name of the default one
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_connection_name")]
    pub default: String,

    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

fn default_connection_name() -> String {
    DEFAULT_CONNECTION.to_string()
}

impl DatabaseConfig {
    /// A single default connection to `database`
    pub fn single(database: &str) -> Self {
        let mut connections = HashMap::new();
        connections.insert(DEFAULT_CONNECTION.to_string(), ConnectionConfig::new(database));
        Self {
            default: DEFAULT_CONNECTION.to_string(),
            connections,
        }
    }

    /// A single default in-memory connection, used heavily in tests
    pub fn in_memory() -> Self {
        Self::single(IN_MEMORY)
    }

    /// Resolve the configured default connection
    pub fn resolve(&self) -> DataResult<(&str, &ConnectionConfig)> {
        self.connections
            .get(&self.default)
            .map(|c| (self.default.as_str(), c))
            .ok_or_else(|| DataError::UnknownConnection(self.default.clone()))
    }
}

/// Opens backend connections for the connection manager
pub trait ConnectionProvider: Send + Sync {
    fn connect(&self, config: &ConnectionConfig) -> DataResult<Connection>;
}

/// File-backed or in-memory SQLite through rusqlite's bundled engine
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteProvider;

impl SqliteProvider {
    /// Configure the connection with the settings recordkit relies on
    fn configure(conn: &Connection, config: &ConnectionConfig) -> rusqlite::Result<()> {
        let journal_mode = config.journal_mode.as_deref().unwrap_or("WAL");
        // In-memory databases answer "memory" regardless of the requested mode
        let _: String =
            conn.query_row(&format!("PRAGMA journal_mode={}", journal_mode), [], |row| {
                row.get(0)
            })?;

        conn.execute("PRAGMA synchronous=NORMAL", [])?;

        // Store temp tables in memory
        conn.execute("PRAGMA temp_store=MEMORY", [])?;

        if config.foreign_keys.unwrap_or(true) {
            conn.execute("PRAGMA foreign_keys=ON", [])?;
        }

        Ok(())
    }
}

impl ConnectionProvider for SqliteProvider {
    fn connect(&self, config: &ConnectionConfig) -> DataResult<Connection> {
        let database = config.database()?;
        let open_err = |source| DataError::Open {
            database: database.to_string(),
            source,
        };

        let conn = if database == IN_MEMORY {
            Connection::open_in_memory().map_err(open_err)?
        } else {
            Connection::open(database).map_err(open_err)?
        };

        Self::configure(&conn, config).map_err(open_err)?;
        debug!("opened sqlite database '{}'", database);
        Ok(conn)
    }
}

/// The provider for the current platform
pub fn default_provider() -> Box<dyn ConnectionProvider> {
    Box::new(SqliteProvider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let conn = SqliteProvider.connect(&ConnectionConfig::in_memory());
        assert!(conn.is_ok());
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite3");
        let config = ConnectionConfig::new(path.to_str().unwrap());

        let conn = SqliteProvider.connect(&config).unwrap();
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_missing_database_key() {
        let err = SqliteProvider
            .connect(&ConnectionConfig::default())
            .unwrap_err();
        assert!(matches!(err, DataError::MissingConfig(ref k) if k == "database"));
    }

    #[test]
    fn test_resolve_unknown_connection() {
        let mut config = DatabaseConfig::in_memory();
        config.default = "reporting".to_string();
        assert!(matches!(
            config.resolve(),
            Err(DataError::UnknownConnection(ref name)) if name == "reporting"
        ));
    }
}
