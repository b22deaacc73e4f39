//! Connection manager and schema cache
//!
//! [`ConnectionManager`] owns the single live SQLite handle and the per-table
//! column cache. It is constructed explicitly and passed by reference to the
//! schema builder, query builder, migrator and models; there is no global
//! instance.
//!
//! The handle sits behind a mutex, so at most one statement is in flight at a
//! time even when the manager is shared across threads.

use super::connection::{default_provider, ConnectionProvider, DatabaseConfig};
use super::value::{Record, Value};
use super::validate_identifier;
use crate::error::{DataError, DataResult};
use crate::events::{LifecycleEvent, SharedEventSink, TracingEventSink};
use rusqlite::{params_from_iter, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

struct LiveConnection {
    name: String,
    conn: Connection,
}

/// Owner of the database handle and the column cache
pub struct ConnectionManager {
    config: DatabaseConfig,
    provider: Box<dyn ConnectionProvider>,
    live: Mutex<Option<LiveConnection>>,
    schema_cache: Mutex<HashMap<String, Vec<String>>>,
    events: SharedEventSink,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock leaves the handle itself usable
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ConnectionManager {
    /// Create a manager for `config` using the platform's default provider.
    ///
    /// No connection is opened until [`ConnectionManager::init`] runs.
    pub fn new(config: DatabaseConfig) -> Self {
        Self::with_provider(config, default_provider())
    }

    /// Create a manager that opens connections through `provider`
    pub fn with_provider(config: DatabaseConfig, provider: Box<dyn ConnectionProvider>) -> Self {
        Self {
            config,
            provider,
            live: Mutex::new(None),
            schema_cache: Mutex::new(HashMap::new()),
            events: Arc::new(TracingEventSink),
        }
    }

    /// Replace the lifecycle event sink
    pub fn with_events(mut self, events: SharedEventSink) -> Self {
        self.events = events;
        self
    }

    /// Create and initialize a manager over a private in-memory database
    pub fn open_in_memory() -> DataResult<Self> {
        let manager = Self::new(DatabaseConfig::in_memory());
        manager.init()?;
        Ok(manager)
    }

    /// Open the configured default connection.
    ///
    /// Calling `init` on an already connected manager is a no-op.
    pub fn init(&self) -> DataResult<()> {
        let mut live = lock(&self.live);
        if live.is_some() {
            return Ok(());
        }

        let (name, connection_config) = self.config.resolve()?;
        let conn = self.provider.connect(connection_config)?;
        info!("database connection '{}' established", name);

        *live = Some(LiveConnection {
            name: name.to_string(),
            conn,
        });
        drop(live);

        self.emit(LifecycleEvent::ConnectionEstablished {
            connection: name.to_string(),
        });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.live).is_some()
    }

    /// Name of the open connection, if any
    pub fn connection_name(&self) -> Option<String> {
        lock(&self.live).as_ref().map(|l| l.name.clone())
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Close the handle and forget all cached schema knowledge
    pub fn dispose(&self) {
        let closed = lock(&self.live).take();
        self.clear_schema_cache(None);
        if let Some(live) = closed {
            debug!("database connection '{}' disposed", live.name);
        }
    }

    /// Deliver a lifecycle notification to the configured sink
    pub fn emit(&self, event: LifecycleEvent) {
        self.events.notify(&event);
    }

    /// Run `f` against the live connection while holding the handle lock
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> DataResult<T>,
    ) -> DataResult<T> {
        let live = lock(&self.live);
        match live.as_ref() {
            Some(live) => f(&live.conn),
            None => Err(DataError::NotInitialized),
        }
    }

    /// Execute a statement without bindings
    pub fn execute(&self, sql: &str) -> DataResult<usize> {
        self.execute_with(sql, &[])
    }

    /// Execute a statement with positional bindings, returning affected rows
    pub fn execute_with(&self, sql: &str, bindings: &[Value]) -> DataResult<usize> {
        debug!(sql, bindings = bindings.len(), "execute");
        self.with_connection(|conn| {
            conn.execute(sql, params_from_iter(bindings.iter()))
                .map_err(|e| DataError::from_sqlite(sql, e))
        })
    }

    /// Execute a DDL statement; engine failures surface as [`DataError::Schema`]
    pub fn execute_schema(&self, sql: &str) -> DataResult<()> {
        debug!(sql, "schema");
        self.with_connection(|conn| {
            conn.execute(sql, []).map_err(|source| DataError::Schema {
                sql: sql.to_string(),
                source,
            })
        })?;
        Ok(())
    }

    /// Execute an INSERT and return the rowid it assigned
    pub fn insert_returning_id(&self, sql: &str, bindings: &[Value]) -> DataResult<i64> {
        debug!(sql, bindings = bindings.len(), "insert");
        self.with_connection(|conn| {
            conn.execute(sql, params_from_iter(bindings.iter()))
                .map_err(|e| DataError::from_sqlite(sql, e))?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Run a query and collect every row
    pub fn query(&self, sql: &str, bindings: &[Value]) -> DataResult<Vec<Record>> {
        debug!(sql, bindings = bindings.len(), "query");
        self.with_connection(|conn| {
            let map_err = |e| DataError::from_sqlite(sql, e);
            let mut stmt = conn.prepare(sql).map_err(map_err)?;
            let names: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();

            let mut rows = stmt
                .query(params_from_iter(bindings.iter()))
                .map_err(map_err)?;
            let mut records = Vec::new();
            while let Some(row) = rows.next().map_err(map_err)? {
                let mut record = Record::new();
                for (idx, name) in names.iter().enumerate() {
                    let value = row.get_ref(idx).map_err(map_err)?;
                    record.insert(name.clone(), Value::from_value_ref(value));
                }
                records.push(record);
            }
            Ok(records)
        })
    }

    /// First column of the first row, or `Value::Null` when there is no row
    pub fn query_scalar(&self, sql: &str, bindings: &[Value]) -> DataResult<Value> {
        debug!(sql, bindings = bindings.len(), "scalar");
        self.with_connection(|conn| {
            let map_err = |e| DataError::from_sqlite(sql, e);
            let mut stmt = conn.prepare(sql).map_err(map_err)?;
            let mut rows = stmt
                .query(params_from_iter(bindings.iter()))
                .map_err(map_err)?;
            let value = match rows.next().map_err(map_err)? {
                Some(row) => Value::from_value_ref(row.get_ref(0).map_err(map_err)?),
                None => Value::Null,
            };
            Ok(value)
        })
    }

    /// Column names of `table`, served from the schema cache when present.
    ///
    /// A table that does not exist yields an empty list, which is not cached.
    /// The cache lock is held across introspection so a concurrent
    /// [`clear_schema_cache`](Self::clear_schema_cache) cannot be overwritten
    /// with columns read before it. Lock order is always cache, then handle.
    pub fn get_columns(&self, table: &str) -> DataResult<Vec<String>> {
        validate_identifier(table)?;
        let mut cache = lock(&self.schema_cache);
        if let Some(columns) = cache.get(table) {
            return Ok(columns.clone());
        }

        let sql = "SELECT name FROM pragma_table_info(?1) ORDER BY cid";
        let columns: Vec<String> = self
            .query(sql, &[Value::from(table)])?
            .into_iter()
            .filter_map(|mut row| match row.remove("name") {
                Some(Value::Text(name)) => Some(name),
                _ => None,
            })
            .collect();

        if !columns.is_empty() {
            cache.insert(table.to_string(), columns.clone());
        }
        Ok(columns)
    }

    /// Invalidate the cached columns of one table, or of every table
    pub fn clear_schema_cache(&self, table: Option<&str>) {
        let mut cache = lock(&self.schema_cache);
        match table {
            Some(table) => {
                cache.remove(table);
            }
            None => cache.clear(),
        }
    }

    /// Whether `table` currently has cached columns
    pub fn is_cached(&self, table: &str) -> bool {
        lock(&self.schema_cache).contains_key(table)
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table: &str) -> DataResult<bool> {
        let exists = self.query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            &[Value::from(table)],
        )?;
        Ok(exists.as_i64().unwrap_or(0) > 0)
    }

    /// Names of all user tables, sorted
    pub fn table_names(&self) -> DataResult<Vec<String>> {
        let rows = self.query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            &[],
        )?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| match row.remove("name") {
                Some(Value::Text(name)) => Some(name),
                _ => None,
            })
            .collect())
    }

    /// Get the row count for a table
    pub fn table_count(&self, table: &str) -> DataResult<u64> {
        validate_identifier(table)?;
        let count = self.query_scalar(&format!("SELECT COUNT(*) FROM {}", table), &[])?;
        Ok(count.as_i64().unwrap_or(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Schema;
    use crate::events::RecordingEventSink;
    use crate::record;

    fn create_test_db() -> ConnectionManager {
        let db = ConnectionManager::open_in_memory().unwrap();
        db.execute("CREATE TABLE test_table (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        db
    }

    #[test]
    fn test_init_is_idempotent() {
        let sink = Arc::new(RecordingEventSink::new());
        let db = ConnectionManager::new(DatabaseConfig::in_memory()).with_events(sink.clone());
        db.init().unwrap();
        db.execute("CREATE TABLE t (id INTEGER)").unwrap();

        // A second init must not reopen (and so wipe) the in-memory database
        db.init().unwrap();
        assert!(db.table_exists("t").unwrap());
        assert_eq!(sink.events().len(), 1);
        assert_eq!(db.connection_name().as_deref(), Some("default"));
    }

    #[test]
    fn test_use_before_init_fails() {
        let db = ConnectionManager::new(DatabaseConfig::in_memory());
        let err = db.execute("SELECT 1").unwrap_err();
        assert!(matches!(err, DataError::NotInitialized));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_dispose() {
        let db = create_test_db();
        db.get_columns("test_table").unwrap();
        assert!(db.is_cached("test_table"));

        db.dispose();
        assert!(!db.is_initialized());
        assert!(!db.is_cached("test_table"));
        assert!(matches!(
            db.query("SELECT 1", &[]),
            Err(DataError::NotInitialized)
        ));

        db.init().unwrap();
        assert!(db.is_initialized());
    }

    #[test]
    fn test_unknown_connection() {
        let mut config = DatabaseConfig::in_memory();
        config.default = "missing".to_string();
        let db = ConnectionManager::new(config);
        assert!(matches!(db.init(), Err(DataError::UnknownConnection(_))));
    }

    #[test]
    fn test_get_columns_and_cache() {
        let db = create_test_db();
        assert_eq!(db.get_columns("test_table").unwrap(), vec!["id", "name"]);

        // Altering behind the cache's back leaves it stale until cleared
        db.execute("ALTER TABLE test_table ADD COLUMN age INTEGER")
            .unwrap();
        assert_eq!(db.get_columns("test_table").unwrap().len(), 2);

        db.clear_schema_cache(Some("test_table"));
        assert_eq!(
            db.get_columns("test_table").unwrap(),
            vec!["id", "name", "age"]
        );
    }

    #[test]
    fn test_missing_table_not_cached() {
        let db = create_test_db();
        assert!(db.get_columns("nope").unwrap().is_empty());
        assert!(!db.is_cached("nope"));
    }

    #[test]
    fn test_query_and_bindings() {
        let db = create_test_db();
        let id = db
            .insert_returning_id(
                "INSERT INTO test_table (name) VALUES (?)",
                &[Value::from("Alice")],
            )
            .unwrap();
        assert_eq!(id, 1);

        let rows = db
            .query(
                "SELECT id, name FROM test_table WHERE name = ?",
                &[Value::from("Alice")],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::Text("Alice".into())));
    }

    #[test]
    fn test_table_helpers() {
        let db = create_test_db();
        db.execute("INSERT INTO test_table (id) VALUES (1), (2), (3)")
            .unwrap();

        assert!(db.table_exists("test_table").unwrap());
        assert!(!db.table_exists("nonexistent_table").unwrap());
        assert_eq!(db.table_count("test_table").unwrap(), 3);
        assert_eq!(db.table_names().unwrap(), vec!["test_table"]);
    }

    #[test]
    fn test_schema_errors_are_classified() {
        let db = create_test_db();
        let err = db
            .execute_schema("ALTER TABLE nope ADD COLUMN x TEXT")
            .unwrap_err();
        assert!(matches!(err, DataError::Schema { .. }));
    }

    #[test]
    fn test_shared_handle_across_threads() {
        let db = ConnectionManager::open_in_memory().unwrap();
        db.execute("CREATE TABLE events (id INTEGER PRIMARY KEY, worker INTEGER, seq INTEGER)")
            .unwrap();

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let db = &db;
                scope.spawn(move || {
                    for seq in 0..50 {
                        db.table("events")
                            .insert(&record! { "worker" => worker, "seq" => seq })
                            .unwrap();
                        assert!(db.table("events").count().unwrap() > 0);
                    }
                });
            }

            // keeps re-populating the cache while the table is altered
            let reader = &db;
            scope.spawn(move || {
                for _ in 0..200 {
                    reader.get_columns("events").unwrap();
                }
            });

            let ddl = &db;
            scope.spawn(move || {
                Schema::new(ddl)
                    .table("events", |t| {
                        t.string("note").nullable();
                    })
                    .unwrap();
            });
        });

        assert_eq!(db.table_count("events").unwrap(), 200);
        for worker in 0..4 {
            assert_eq!(
                db.table("events").where_eq("worker", worker).count().unwrap(),
                50
            );
        }
        assert_eq!(
            db.get_columns("events").unwrap(),
            vec!["id", "worker", "seq", "note"]
        );

        db.table("events")
            .insert(&record! { "worker" => 9, "seq" => 0, "note" => "after" })
            .unwrap();
        assert_eq!(db.table("events").where_eq("note", "after").count().unwrap(), 1);
    }
}
