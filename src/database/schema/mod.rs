//! Schema building
//!
//! [`Schema`] is the entry point migrations use to evolve tables. Every
//! operation that changes a table's shape invalidates that table's entry in
//! the connection manager's schema cache.
//!
//! ```rust,ignore
//! use recordkit::database::{ConnectionManager, Schema};
//!
//! let db = ConnectionManager::open_in_memory()?;
//! Schema::new(&db).create("items", |table| {
//!     table.id();
//!     table.string("name");
//!     table.timestamps();
//! })?;
//! ```

mod blueprint;

pub use blueprint::{Blueprint, ColumnDefinition, ColumnType, DefaultValue};

use crate::database::core::{validate_identifier, ConnectionManager};
use crate::error::DataResult;
use tracing::info;

/// Schema builder bound to a connection manager
pub struct Schema<'a> {
    db: &'a ConnectionManager,
}

impl<'a> Schema<'a> {
    pub fn new(db: &'a ConnectionManager) -> Self {
        Self { db }
    }

    /// The connection manager, for migrations that need raw statements
    pub fn connection(&self) -> &'a ConnectionManager {
        self.db
    }

    /// Create `table` from the columns `define` declares
    pub fn create(&self, table: &str, define: impl FnOnce(&mut Blueprint)) -> DataResult<()> {
        let mut blueprint = Blueprint::create(table);
        define(&mut blueprint);
        info!("creating table {}", table);
        blueprint.execute(self.db)
    }

    /// Modify `table`: add, rename and drop columns
    pub fn table(&self, table: &str, define: impl FnOnce(&mut Blueprint)) -> DataResult<()> {
        let mut blueprint = Blueprint::alter(table);
        define(&mut blueprint);
        info!("altering table {}", table);
        blueprint.execute(self.db)
    }

    pub fn drop(&self, table: &str) -> DataResult<()> {
        self.drop_statement(table, "DROP TABLE")
    }

    pub fn drop_if_exists(&self, table: &str) -> DataResult<()> {
        self.drop_statement(table, "DROP TABLE IF EXISTS")
    }

    fn drop_statement(&self, table: &str, verb: &str) -> DataResult<()> {
        let sql = format!("{} {}", verb, validate_identifier(table)?);
        let result = self.db.execute_schema(&sql);
        self.db.clear_schema_cache(Some(table));
        result
    }

    pub fn rename(&self, from: &str, to: &str) -> DataResult<()> {
        let sql = format!(
            "ALTER TABLE {} RENAME TO {}",
            validate_identifier(from)?,
            validate_identifier(to)?
        );
        let result = self.db.execute_schema(&sql);
        self.db.clear_schema_cache(Some(from));
        self.db.clear_schema_cache(Some(to));
        result
    }

    pub fn has_table(&self, table: &str) -> DataResult<bool> {
        self.db.table_exists(table)
    }

    pub fn has_column(&self, table: &str, column: &str) -> DataResult<bool> {
        Ok(self.db.get_columns(table)?.iter().any(|c| c == column))
    }

    pub fn get_columns(&self, table: &str) -> DataResult<Vec<String>> {
        self.db.get_columns(table)
    }
}
