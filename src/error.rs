//! Error types for the data layer
//!
//! Every fallible operation in [`crate::database`] and [`crate::model`] returns a
//! [`DataResult`]. Errors are never logged and swallowed inside the library; they
//! surface to the caller, which decides whether to retry, report or abort.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result alias used throughout the data layer
pub type DataResult<T> = Result<T, DataError>;

/// Errors raised by the connection manager, schema builder, query builder,
/// migrator and model layer.
#[derive(Error, Debug)]
pub enum DataError {
    // === Configuration ===
    /// The connection was used before `init()` or after `dispose()`.
    #[error("database connection not initialized; call init() first")]
    NotInitialized,

    /// A required configuration key is absent.
    #[error("missing required configuration key '{0}'")]
    MissingConfig(String),

    /// The configured default connection has no entry in the connection table.
    #[error("connection '{0}' is not configured")]
    UnknownConnection(String),

    /// The backend could not open the database file.
    #[error("failed to open database '{database}': {source}")]
    Open {
        database: String,
        #[source]
        source: rusqlite::Error,
    },

    // === Statements ===
    /// A DDL statement was rejected by the storage engine.
    #[error("schema statement failed: {sql}: {source}")]
    Schema {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    /// An INSERT or UPDATE violated a UNIQUE, NOT NULL or similar constraint.
    #[error("constraint violation: {message}")]
    Constraint {
        message: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Any other engine failure while running a statement.
    #[error("sql error: {sql}: {source}")]
    Sql {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A table or column name is not a plain SQL identifier.
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// A comparison operator outside the supported set.
    #[error("unsupported operator '{0}'")]
    InvalidOperator(String),

    // === Migrations ===
    /// A migration's forward or reverse step failed. Migrations completed
    /// before it in the same call stay recorded in the ledger.
    #[error("migration '{name}' failed: {source}")]
    Migration {
        name: String,
        #[source]
        source: Box<DataError>,
    },

    // === Models ===
    /// An attribute value cannot be coerced to its declared cast.
    #[error("cannot cast attribute '{attribute}' to {target}: {reason}")]
    Cast {
        attribute: String,
        target: &'static str,
        reason: String,
    },

    /// An update or delete was requested on a model without an identity.
    #[error("model for table '{0}' has no primary key value")]
    MissingIdentity(String),

    /// An update matched no stored row for the model's identity.
    #[error("no row in '{table}' with id {id}")]
    RowNotFound { table: String, id: i64 },

    /// The remote API rejected or failed a sync request.
    #[error("remote sync failed for '{resource}': {message}")]
    Remote { resource: String, message: String },
}

impl DataError {
    /// Classify an engine error raised while running `sql`.
    ///
    /// Constraint violations become [`DataError::Constraint`] so callers can
    /// match on them; everything else is wrapped as [`DataError::Sql`].
    pub fn from_sqlite(sql: &str, source: rusqlite::Error) -> Self {
        match source.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => DataError::Constraint {
                message: source.to_string(),
                source,
            },
            _ => DataError::Sql {
                sql: sql.to_string(),
                source,
            },
        }
    }

    /// Whether this error is a configuration problem (use before init,
    /// missing keys, unknown connection).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DataError::NotInitialized
                | DataError::MissingConfig(_)
                | DataError::UnknownConnection(_)
        )
    }

    /// Whether this error, or the error a failed migration wraps, is a
    /// constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            DataError::Constraint { .. } => true,
            DataError::Migration { source, .. } => source.is_constraint_violation(),
            _ => false,
        }
    }
}
