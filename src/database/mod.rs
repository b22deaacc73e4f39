//! Database module
//!
//! This module provides all storage functionality for recordkit, organized into:
//!
//! - **core**: Connection providers, the connection manager and its schema cache
//! - **schema**: Table blueprints compiled to CREATE/ALTER statements
//! - **query**: The fluent single-table query builder
//! - **migration**: The migration runner and its ledger table
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # ConnectionProvider, SqliteProvider, configuration
//! │   ├── manager     # ConnectionManager: handle, raw execute/query, schema cache
//! │   └── value       # Value and Record
//! │
//! ├── schema/         # DDL
//! │   └── blueprint   # Column definitions and table blueprints
//! │
//! ├── query/          # DML and reads
//! │   └── grammar     # SQL text generation
//! │
//! └── migration/      # Ledger-backed migration runner
//! ```
//!
//! The schema builder and query builder never call each other; both go through
//! the [`ConnectionManager`]. The migrator uses both.
//!
//! # Usage
//!
//! ```rust,ignore
//! use recordkit::database::{ConnectionManager, DatabaseConfig, Direction, Operator, Schema};
//! use recordkit::record;
//!
//! let db = ConnectionManager::new(DatabaseConfig::single("/tmp/app.sqlite3"));
//! db.init()?;
//!
//! Schema::new(&db).create("users", |table| {
//!     table.id();
//!     table.string("name");
//!     table.integer("age");
//! })?;
//!
//! db.table("users").insert(&record! { "name" => "Alice", "age" => 25 })?;
//! let older = db
//!     .table("users")
//!     .where_op("age", Operator::Gte, 30)
//!     .order_by("age", Direction::Desc)
//!     .get()?;
//! ```

pub mod core;
pub mod migration;
pub mod query;
pub mod schema;

pub use core::{
    default_provider, validate_identifier, ConnectionConfig, ConnectionManager,
    ConnectionProvider, DatabaseConfig, Record, SqliteProvider, Value, DEFAULT_CONNECTION,
    IN_MEMORY,
};
pub use migration::{
    migration, FnMigration, Migration, MigrationRecord, MigrationStatus, Migrator,
    MIGRATIONS_TABLE,
};
pub use query::{CompiledQuery, Direction, Operator, QueryBuilder};
pub use schema::{Blueprint, ColumnDefinition, ColumnType, DefaultValue, Schema};

/// Ensure the data directory exists
pub fn ensure_data_dir(data_dir: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory '{}': {}", data_dir, e))
}
