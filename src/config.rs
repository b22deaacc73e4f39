use crate::database::{
    ensure_data_dir, ConnectionConfig, DatabaseConfig, DEFAULT_CONNECTION, IN_MEMORY,
};
use anyhow::{anyhow, Result};
use config::Config;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the default database inside the data directory
pub const DEFAULT_DATABASE_FILE: &str = "recordkit.sqlite3";

pub struct RecordkitConfig {
    /// Directory holding recordkit's database files
    pub data_dir: String,

    /// Name of the connection the manager opens
    pub default_connection: String,

    /// Named connections as configured; may be empty
    pub connections: HashMap<String, ConnectionConfig>,
}

const EMPTY_CONFIG: &str = r#"### recordkit configuration file

### directory for database files, relative connection paths resolve against it
# data_dir = "~/.recordkit"

### connection opened by default
# default_connection = "default"

### named connections
# [connections.default]
# database = "recordkit.sqlite3"
# journal_mode = "WAL"
# foreign_keys = true
"#;

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    data_dir: Option<String>,
    default_connection: Option<String>,
    #[serde(default)]
    connections: HashMap<String, ConnectionConfig>,
}

fn home_dir() -> Result<String> {
    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not find home directory"))?
        .to_str()
        .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
        .to_owned())
}

impl Default for RecordkitConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.recordkit", home_dir),
            default_connection: DEFAULT_CONNECTION.to_string(),
            connections: HashMap::new(),
        }
    }
}

impl RecordkitConfig {
    /// Create and initialize a new configuration.
    ///
    /// Reads `path` when given, otherwise `$HOME/.recordkit/recordkit.toml`;
    /// a missing file is created from a commented template. `.env` and
    /// `RECORDKIT_*` environment variables override file settings.
    pub fn new(path: &Option<String>) -> Result<RecordkitConfig> {
        // .env is optional
        let _ = dotenvy::dotenv();

        let recordkit_dir = format!("{}/.recordkit", home_dir()?);
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => {
                std::fs::create_dir_all(recordkit_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create recordkit directory: {}", e))?;
                PathBuf::from(format!("{}/recordkit.toml", recordkit_dir))
            }
        };

        let config = Self::from_file(&config_path)?;
        ensure_data_dir(&config.data_dir)?;
        Ok(config)
    }

    /// Load configuration from `path` plus the environment, without touching
    /// the home directory
    pub fn from_file(path: &Path) -> Result<RecordkitConfig> {
        let mut builder = Config::builder();

        if path.exists() {
            let path_str = path
                .to_str()
                .ok_or_else(|| anyhow!("Could not convert path to string"))?;
            builder = builder.add_source(config::File::with_name(path_str));
        } else {
            std::fs::write(path, EMPTY_CONFIG).map_err(|e| {
                anyhow!("Unable to create config file {}: {}", path.display(), e)
            })?;
        }

        // Settings from the environment (with a prefix of RECORDKIT)
        // E.g., `RECORDKIT_DATA_DIR=/var/lib/app` or
        // `RECORDKIT_CONNECTIONS__DEFAULT__DATABASE=app.sqlite3`
        builder = builder.add_source(
            config::Environment::with_prefix("RECORDKIT")
                .prefix_separator("_")
                .separator("__"),
        );

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let raw = settings
            .try_deserialize::<RawConfig>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        let defaults = RecordkitConfig::default();
        let config = RecordkitConfig {
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
            default_connection: raw
                .default_connection
                .unwrap_or(defaults.default_connection),
            connections: raw.connections,
        };
        debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Path of the database file used when no connection is configured
    pub fn default_database_path(&self) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/{}", data_dir, DEFAULT_DATABASE_FILE)
    }

    /// Connection table for the connection manager.
    ///
    /// Relative database paths resolve against `data_dir`. Without any
    /// configured connection, the default connection points at
    /// [`DEFAULT_DATABASE_FILE`] in the data directory.
    pub fn database_config(&self) -> DatabaseConfig {
        let mut connections: HashMap<String, ConnectionConfig> = self
            .connections
            .iter()
            .map(|(name, conn)| {
                let mut conn = conn.clone();
                conn.database = conn.database.map(|db| self.resolve_path(&db));
                (name.clone(), conn)
            })
            .collect();

        if connections.is_empty() {
            connections.insert(
                self.default_connection.clone(),
                ConnectionConfig::new(&self.default_database_path()),
            );
        }

        DatabaseConfig {
            default: self.default_connection.clone(),
            connections,
        }
    }

    fn resolve_path(&self, database: &str) -> String {
        if database == IN_MEMORY || Path::new(database).is_absolute() {
            return database.to_string();
        }
        Path::new(&self.data_dir)
            .join(database)
            .to_string_lossy()
            .to_string()
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let database = self.database_config();
        let mut lines = vec![
            format!("Config File:        {}", Self::config_file_path()),
            format!("Data Directory:     {}", self.data_dir),
            format!("Default Connection: {}", self.default_connection),
        ];

        let mut names: Vec<&String> = database.connections.keys().collect();
        names.sort();
        for name in names {
            let path = database.connections[name]
                .database
                .as_deref()
                .unwrap_or("(missing database)");
            lines.push(format!("Connection {:<8} {}", format!("{}:", name), path));
        }

        lines.join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.recordkit/recordkit.toml", home_dir)
    }
}
