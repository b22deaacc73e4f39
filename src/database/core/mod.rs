//! Core database infrastructure
//!
//! This module provides the foundational database components used throughout recordkit:
//! - `ConnectionProvider` / `SqliteProvider`: open backend connections from configuration
//! - `ConnectionManager`: the shared handle, raw execute/query and the schema cache
//! - `Value` / `Record`: storage values and rows

mod connection;
mod manager;
mod value;

pub use connection::{
    default_provider, ConnectionConfig, ConnectionProvider, DatabaseConfig, SqliteProvider,
    DEFAULT_CONNECTION, IN_MEMORY,
};
pub use manager::ConnectionManager;
pub use value::{Record, Value};

use crate::error::{DataError, DataResult};

/// Check that `name` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// Table and column names cannot be bound as parameters, so everything that is
/// spliced into statement text passes through here first.
pub fn validate_identifier(name: &str) -> DataResult<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(name)
    } else {
        Err(DataError::InvalidIdentifier(name.to_string()))
    }
}
