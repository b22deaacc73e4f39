//! Fluent single-table query builder
//!
//! [`QueryBuilder`] accumulates a projection, AND-combined predicates, sort keys,
//! limit and offset, and compiles them to parameterized SQL when a terminal
//! operation runs. Values are always bound, never spliced into the statement.
//!
//! # Usage
//!
//! ```rust,ignore
//! use recordkit::database::{ConnectionManager, Direction, Operator};
//!
//! let db = ConnectionManager::open_in_memory()?;
//! let adults = db
//!     .table("users")
//!     .where_op("age", Operator::Gte, 30)
//!     .order_by("age", Direction::Desc)
//!     .get()?;
//! ```
//!
//! Writes (`insert`, `insert_all`, `update`) only use columns present in the
//! connection manager's schema cache for the target table. Unknown keys are
//! dropped before the statement is built.

mod grammar;

pub use grammar::{CompiledQuery, Direction, Operator};

use crate::database::core::{ConnectionManager, Record, Value};
use crate::error::{DataError, DataResult};
use grammar::Predicate;
use rusqlite::params_from_iter;
use tracing::debug;

/// Bound parameters allowed in one statement by the bundled SQLite
const MAX_VARIABLES: usize = 32766;

/// Terms allowed in one compound SELECT by the bundled SQLite
const MAX_COMPOUND_SELECT: usize = 500;

/// Query builder for one table
#[derive(Clone)]
pub struct QueryBuilder<'a> {
    db: &'a ConnectionManager,
    /// Target table
    table: String,
    /// SELECT columns (defaults to *)
    columns: Option<Vec<String>>,
    /// WHERE predicates, joined with AND
    wheres: Vec<Predicate>,
    /// ORDER BY keys in declaration order
    orders: Vec<(String, Direction)>,
    /// LIMIT clause
    limit: Option<u64>,
    /// OFFSET clause
    offset: Option<u64>,
}

impl ConnectionManager {
    /// Start a query against `table`
    pub fn table(&self, table: &str) -> QueryBuilder<'_> {
        QueryBuilder::new(self, table)
    }
}

impl<'a> QueryBuilder<'a> {
    pub fn new(db: &'a ConnectionManager, table: &str) -> Self {
        Self {
            db,
            table: table.to_string(),
            columns: None,
            wheres: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Restrict the projection to `columns`
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// `column = value`
    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_op(column, Operator::Eq, value)
    }

    /// `column <op> value`
    pub fn where_op(mut self, column: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.wheres.push(Predicate::Compare {
            column: column.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    /// `column IN (values...)`
    pub fn where_in<V: Into<Value>>(
        mut self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.wheres.push(Predicate::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.wheres.push(Predicate::Null {
            column: column.to_string(),
            negated: false,
        });
        self
    }

    pub fn where_not_null(mut self, column: &str) -> Self {
        self.wheres.push(Predicate::Null {
            column: column.to_string(),
            negated: true,
        });
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.orders.push((column.to_string(), direction));
        self
    }

    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, Direction::Desc)
    }

    /// Newest first by `column`
    pub fn latest(self, column: &str) -> Self {
        self.order_by_desc(column)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    // =========================================================================
    // Compilation
    // =========================================================================

    /// Compile the full SELECT statement
    pub fn to_sql(&self) -> DataResult<CompiledQuery> {
        grammar::compile_select(
            &self.table,
            self.columns.as_deref(),
            &self.wheres,
            &self.orders,
            self.limit,
            self.offset,
        )
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// All rows matching the query, in the requested order
    pub fn get(&self) -> DataResult<Vec<Record>> {
        let query = self.to_sql()?;
        self.db.query(&query.sql, &query.bindings)
    }

    /// The first matching row
    pub fn first(&self) -> DataResult<Option<Record>> {
        Ok(self.clone().limit(1).get()?.into_iter().next())
    }

    /// The row whose `id` equals `id`
    pub fn find(&self, id: i64) -> DataResult<Option<Record>> {
        self.clone().where_eq("id", id).first()
    }

    /// A single column of the first matching row
    pub fn value(&self, column: &str) -> DataResult<Option<Value>> {
        Ok(self
            .clone()
            .select(&[column])
            .first()?
            .and_then(|mut row| row.remove(column)))
    }

    /// One column from every matching row
    pub fn pluck(&self, column: &str) -> DataResult<Vec<Value>> {
        Ok(self
            .clone()
            .select(&[column])
            .get()?
            .into_iter()
            .filter_map(|mut row| row.remove(column))
            .collect())
    }

    /// Number of matching rows, counted by the engine
    pub fn count(&self) -> DataResult<u64> {
        let query = grammar::compile_count(&self.table, &self.wheres)?;
        let count = self.db.query_scalar(&query.sql, &query.bindings)?;
        Ok(count.as_i64().unwrap_or(0) as u64)
    }

    /// Whether at least one row matches
    pub fn exists(&self) -> DataResult<bool> {
        let query = grammar::compile_exists(&self.table, &self.wheres)?;
        let exists = self.db.query_scalar(&query.sql, &query.bindings)?;
        Ok(exists.as_i64().unwrap_or(0) != 0)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Keep only the entries of `data` whose keys are known columns of the table
    fn known_columns(&self, data: &Record) -> DataResult<Vec<(String, Value)>> {
        let known = self.db.get_columns(&self.table)?;
        let mut kept = Vec::with_capacity(data.len());
        for (column, value) in data {
            if known.iter().any(|k| k == column) {
                kept.push((column.clone(), value.clone()));
            } else {
                debug!("dropping unknown column '{}' for table {}", column, self.table);
            }
        }
        Ok(kept)
    }

    /// Insert one row and return the rowid it was assigned
    pub fn insert(&self, data: &Record) -> DataResult<i64> {
        let values = self.known_columns(data)?;
        let query = grammar::compile_insert(&self.table, &values)?;
        self.db.insert_returning_id(&query.sql, &query.bindings)
    }

    /// Insert many rows, returning the number inserted.
    ///
    /// The column list is the union of known columns across `records`; a record
    /// lacking one of them binds NULL. Rows are sent in multi-row statements
    /// sized to the engine's variable limit, all in one transaction, so either
    /// every row is inserted or none is.
    pub fn insert_all(&self, records: &[Record]) -> DataResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let known = self.db.get_columns(&self.table)?;
        let columns: Vec<String> = known
            .into_iter()
            .filter(|column| records.iter().any(|r| r.contains_key(column)))
            .collect();
        let rows_per_statement = match columns.len() {
            0 => MAX_COMPOUND_SELECT,
            n => (MAX_VARIABLES / n).max(1),
        };
        let statements = records
            .chunks(rows_per_statement)
            .map(|chunk| grammar::compile_insert_all(&self.table, &columns, chunk))
            .collect::<DataResult<Vec<_>>>()?;
        debug!(
            table = self.table.as_str(),
            rows = records.len(),
            statements = statements.len(),
            "insert_all"
        );

        self.db.with_connection(|conn| {
            // Join a transaction the caller already opened instead of nesting
            let tx = if conn.is_autocommit() {
                Some(
                    conn.unchecked_transaction()
                        .map_err(|e| DataError::from_sqlite("BEGIN", e))?,
                )
            } else {
                None
            };

            let mut inserted = 0;
            for query in &statements {
                inserted += conn
                    .execute(&query.sql, params_from_iter(query.bindings.iter()))
                    .map_err(|e| DataError::from_sqlite(&query.sql, e))?;
            }

            if let Some(tx) = tx {
                tx.commit().map_err(|e| DataError::from_sqlite("COMMIT", e))?;
            }
            Ok(inserted)
        })
    }

    /// Update matching rows with the known columns of `data`.
    ///
    /// Returns the number of affected rows; nothing runs when no known column
    /// remains.
    pub fn update(&self, data: &Record) -> DataResult<usize> {
        let values = self.known_columns(data)?;
        if values.is_empty() {
            return Ok(0);
        }
        let query = grammar::compile_update(&self.table, &values, &self.wheres)?;
        self.db.execute_with(&query.sql, &query.bindings)
    }

    /// Delete matching rows
    pub fn delete(&self) -> DataResult<usize> {
        let query = grammar::compile_delete(&self.table, &self.wheres)?;
        self.db.execute_with(&query.sql, &query.bindings)
    }

    /// Delete every row of the table, ignoring any predicates on this builder
    pub fn truncate(&self) -> DataResult<usize> {
        let query = grammar::compile_delete(&self.table, &[])?;
        self.db.execute_with(&query.sql, &query.bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Schema;
    use crate::error::DataError;
    use crate::record;

    fn seeded_db() -> ConnectionManager {
        let db = ConnectionManager::open_in_memory().unwrap();
        Schema::new(&db)
            .create("users", |table| {
                table.id();
                table.string("name").unique();
                table.integer("age");
                table.string("email").nullable();
            })
            .unwrap();

        let users = db.table("users");
        users
            .insert(&record! { "name" => "Alice", "age" => 25, "email" => "alice@example.com" })
            .unwrap();
        users.insert(&record! { "name" => "Bob", "age" => 30 }).unwrap();
        users
            .insert(&record! { "name" => "Charlie", "age" => 35, "email" => "charlie@example.com" })
            .unwrap();
        db
    }

    fn names(rows: &[Record]) -> Vec<String> {
        rows.iter()
            .filter_map(|r| r.get("name").and_then(|v| v.as_str()).map(String::from))
            .collect()
    }

    #[test]
    fn test_where_and_order() {
        let db = seeded_db();
        let rows = db
            .table("users")
            .where_op("age", Operator::Gte, 30)
            .order_by("age", Direction::Desc)
            .get()
            .unwrap();

        assert_eq!(names(&rows), vec!["Charlie", "Bob"]);
        assert_eq!(rows[0].get("age"), Some(&Value::Integer(35)));
        assert_eq!(rows[1].get("age"), Some(&Value::Integer(30)));
    }

    #[test]
    fn test_first_value_pluck() {
        let db = seeded_db();
        let users = db.table("users").order_by("age", Direction::Asc);

        let first = users.first().unwrap().unwrap();
        assert_eq!(first.get("name"), Some(&Value::Text("Alice".into())));

        assert_eq!(
            users.value("name").unwrap(),
            Some(Value::Text("Alice".into()))
        );
        assert_eq!(
            users.pluck("age").unwrap(),
            vec![Value::Integer(25), Value::Integer(30), Value::Integer(35)]
        );
        assert!(db
            .table("users")
            .where_eq("name", "Nobody")
            .first()
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_null_checks() {
        let db = seeded_db();
        assert_eq!(
            names(&db.table("users").where_null("email").get().unwrap()),
            vec!["Bob"]
        );
        assert_eq!(db.table("users").where_not_null("email").count().unwrap(), 2);
    }

    #[test]
    fn test_where_in() {
        let db = seeded_db();
        let rows = db
            .table("users")
            .where_in("name", ["Alice", "Charlie"])
            .order_by("name", Direction::Asc)
            .get()
            .unwrap();
        assert_eq!(names(&rows), vec!["Alice", "Charlie"]);
    }

    #[test]
    fn test_limit_offset() {
        let db = seeded_db();
        let page = db
            .table("users")
            .order_by("id", Direction::Asc)
            .limit(1)
            .offset(1)
            .get()
            .unwrap();
        assert_eq!(names(&page), vec!["Bob"]);

        let tail = db
            .table("users")
            .order_by("id", Direction::Asc)
            .offset(2)
            .get()
            .unwrap();
        assert_eq!(names(&tail), vec!["Charlie"]);
    }

    #[test]
    fn test_count_and_exists_agree() {
        let db = seeded_db();
        let cases = [
            db.table("users"),
            db.table("users").where_op("age", Operator::Gt, 100),
            db.table("users").where_eq("name", "Bob"),
            db.table("users").where_null("email").where_op("age", Operator::Lt, 30),
        ];
        for query in cases {
            let count = query.count().unwrap();
            assert_eq!(count > 0, query.exists().unwrap());
        }
    }

    #[test]
    fn test_insert_drops_unknown_keys() {
        let db = seeded_db();
        let id = db
            .table("users")
            .insert(&record! { "name" => "Dana", "age" => 41, "favourite_colour" => "teal" })
            .unwrap();
        assert_eq!(id, 4);

        let row = db.table("users").find(id).unwrap().unwrap();
        assert_eq!(row.get("name"), Some(&Value::Text("Dana".into())));
        assert!(!row.contains_key("favourite_colour"));
    }

    #[test]
    fn test_insert_all() {
        let db = seeded_db();
        let inserted = db
            .table("users")
            .insert_all(&[
                record! { "name" => "Eve", "age" => 22 },
                record! { "name" => "Frank", "age" => 50, "email" => "f@example.com", "extra" => 1 },
            ])
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(db.table("users").count().unwrap(), 5);
        assert!(db
            .table("users")
            .where_eq("name", "Eve")
            .where_null("email")
            .exists()
            .unwrap());

        assert_eq!(db.table("users").insert_all(&[]).unwrap(), 0);
    }

    #[test]
    fn test_insert_all_is_single_statement() {
        let db = seeded_db();
        // The duplicate name fails the whole statement, so nothing is inserted
        let err = db
            .table("users")
            .insert_all(&[
                record! { "name" => "Gina", "age" => 28 },
                record! { "name" => "Alice", "age" => 29 },
            ])
            .unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(db.table("users").count().unwrap(), 3);
    }

    #[test]
    fn test_update_scoped_by_where() {
        let db = seeded_db();
        let affected = db
            .table("users")
            .where_op("age", Operator::Lt, 32)
            .update(&record! { "age" => 99, "unknown" => true })
            .unwrap();
        assert_eq!(affected, 2);
        assert_eq!(
            db.table("users").where_eq("age", 99).count().unwrap(),
            2
        );

        let nothing = db
            .table("users")
            .update(&record! { "unknown" => 1 })
            .unwrap();
        assert_eq!(nothing, 0);
    }

    #[test]
    fn test_constraint_violation_is_distinct() {
        let db = seeded_db();
        let err = db
            .table("users")
            .insert(&record! { "name" => "Alice", "age" => 1 })
            .unwrap_err();
        assert!(matches!(err, DataError::Constraint { .. }));

        let err = db
            .table("users")
            .insert(&record! { "name" => "NoAge" })
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_delete_and_truncate() {
        let db = seeded_db();
        let removed = db.table("users").where_eq("name", "Alice").delete().unwrap();
        assert_eq!(removed, 1);
        assert_eq!(db.table("users").count().unwrap(), 2);

        let scoped = db.table("users").where_eq("name", "Bob");
        scoped.truncate().unwrap();
        assert_eq!(db.table("users").count().unwrap(), 0);
        assert_eq!(scoped.count().unwrap(), 0);
    }

    #[test]
    fn test_injection_is_bound() {
        let db = seeded_db();
        let rows = db
            .table("users")
            .where_eq("name", "x' OR '1'='1")
            .get()
            .unwrap();
        assert!(rows.is_empty());

        let err = db
            .table("users")
            .where_eq("name = name OR 1", 1)
            .get()
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_insert_all_beyond_variable_limit() {
        let db = ConnectionManager::open_in_memory().unwrap();
        Schema::new(&db)
            .create("items", |table| {
                table.id();
                table.string("sku").unique();
                table.integer("qty");
                table.real("price");
            })
            .unwrap();

        let records: Vec<Record> = (0..12_000)
            .map(|i| record! { "sku" => format!("sku-{}", i), "qty" => i, "price" => 1.5 })
            .collect();
        assert_eq!(db.table("items").insert_all(&records).unwrap(), 12_000);
        assert_eq!(db.table("items").count().unwrap(), 12_000);
    }

    #[test]
    fn test_insert_all_is_all_or_nothing() {
        let db = ConnectionManager::open_in_memory().unwrap();
        Schema::new(&db)
            .create("items", |table| {
                table.id();
                table.string("sku").unique();
                table.integer("qty");
                table.real("price");
            })
            .unwrap();

        // the duplicate lands in the last statement of the batch
        let mut records: Vec<Record> = (0..12_000)
            .map(|i| record! { "sku" => format!("sku-{}", i), "qty" => i, "price" => 1.5 })
            .collect();
        records.push(record! { "sku" => "sku-0", "qty" => 0, "price" => 1.5 });

        let err = db.table("items").insert_all(&records).unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(db.table("items").count().unwrap(), 0);
    }
}
