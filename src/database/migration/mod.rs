//! Schema migrations
//!
//! A [`Migrator`] applies named [`Migration`]s in the order given and records
//! each one in the `migrations` ledger table together with its batch number.
//! Every migration applied by a single [`Migrator::run`] call shares one batch;
//! [`Migrator::rollback`] reverses the most recent batch.
//!
//! # Failure semantics
//!
//! Batches are not atomic. Each migration is recorded immediately after its
//! forward step succeeds, and removed immediately after its reverse step
//! succeeds. When a step fails, the error is returned straight away and
//! everything completed before it stays recorded. The ledger is the source of
//! truth for what actually ran.
//!
//! ```rust,ignore
//! use recordkit::database::{migration, ConnectionManager, Migrator};
//!
//! let migrations = vec![migration(
//!     "2024_01_01_000000_create_items",
//!     |schema| schema.create("items", |t| { t.id(); t.string("name"); }),
//!     |schema| schema.drop_if_exists("items"),
//! )];
//!
//! let db = ConnectionManager::open_in_memory()?;
//! let ran = Migrator::new(&db).run(&migrations)?;
//! ```

use crate::database::core::{ConnectionManager, Value};
use crate::database::query::Direction;
use crate::database::schema::Schema;
use crate::error::{DataError, DataResult};
use crate::events::LifecycleEvent;
use crate::record;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

/// Name of the ledger table
pub const MIGRATIONS_TABLE: &str = "migrations";

/// A reversible schema change
pub trait Migration: Send + Sync {
    /// Unique, sortable name, typically prefixed with a timestamp
    fn name(&self) -> &str;

    fn up(&self, schema: &Schema<'_>) -> DataResult<()>;

    fn down(&self, schema: &Schema<'_>) -> DataResult<()>;
}

type MigrationFn = Box<dyn Fn(&Schema<'_>) -> DataResult<()> + Send + Sync>;

/// A migration built from two closures
pub struct FnMigration {
    name: String,
    up: MigrationFn,
    down: MigrationFn,
}

impl Migration for FnMigration {
    fn name(&self) -> &str {
        &self.name
    }

    fn up(&self, schema: &Schema<'_>) -> DataResult<()> {
        (self.up)(schema)
    }

    fn down(&self, schema: &Schema<'_>) -> DataResult<()> {
        (self.down)(schema)
    }
}

/// Build a boxed migration from forward and reverse closures
pub fn migration<U, D>(name: &str, up: U, down: D) -> Box<dyn Migration>
where
    U: Fn(&Schema<'_>) -> DataResult<()> + Send + Sync + 'static,
    D: Fn(&Schema<'_>) -> DataResult<()> + Send + Sync + 'static,
{
    Box::new(FnMigration {
        name: name.to_string(),
        up: Box::new(up),
        down: Box::new(down),
    })
}

/// A row of the ledger table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct MigrationRecord {
    pub id: i64,
    pub migration: String,
    pub batch: i64,
}

/// Whether a known migration has been applied, and in which batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub name: String,
    pub batch: Option<i64>,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        self.batch.is_some()
    }
}

/// Runs and reverses migrations against one connection
pub struct Migrator<'a> {
    db: &'a ConnectionManager,
}

impl<'a> Migrator<'a> {
    pub fn new(db: &'a ConnectionManager) -> Self {
        Self { db }
    }

    /// Create the ledger table if it does not exist yet
    pub fn ensure_ledger(&self) -> DataResult<()> {
        if self.db.table_exists(MIGRATIONS_TABLE)? {
            return Ok(());
        }
        Schema::new(self.db).create(MIGRATIONS_TABLE, |table| {
            table.id();
            table.string("migration").unique();
            table.integer("batch");
        })
    }

    /// Every ledger entry in application order
    pub fn applied(&self) -> DataResult<Vec<MigrationRecord>> {
        self.ensure_ledger()?;
        let rows = self
            .db
            .table(MIGRATIONS_TABLE)
            .order_by("id", Direction::Asc)
            .get()?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(MigrationRecord {
                    id: row.get("id")?.as_i64()?,
                    migration: row.get("migration")?.as_str()?.to_string(),
                    batch: row.get("batch")?.as_i64()?,
                })
            })
            .collect())
    }

    /// Highest batch number in the ledger, 0 when nothing has run
    pub fn last_batch(&self) -> DataResult<i64> {
        self.ensure_ledger()?;
        let batch = self
            .db
            .table(MIGRATIONS_TABLE)
            .order_by("batch", Direction::Desc)
            .value("batch")?;
        Ok(batch.and_then(|b| b.as_i64()).unwrap_or(0))
    }

    /// Apply every migration not yet in the ledger, in input order.
    ///
    /// Returns the names that ran; empty when nothing was pending.
    pub fn run(&self, migrations: &[Box<dyn Migration>]) -> DataResult<Vec<String>> {
        self.ensure_ledger()?;
        let mut applied: HashSet<String> = self
            .applied()?
            .into_iter()
            .map(|r| r.migration)
            .collect();

        let pending: Vec<&dyn Migration> = migrations
            .iter()
            .map(|m| &**m)
            .filter(|m| !applied.contains(m.name()))
            .collect();
        if pending.is_empty() {
            info!("nothing to migrate");
            return Ok(Vec::new());
        }

        let batch = self.last_batch()? + 1;
        let schema = Schema::new(self.db);
        let mut ran = Vec::with_capacity(pending.len());

        let result = pending.iter().try_for_each(|migration| -> DataResult<()> {
            let name = migration.name();
            // The same name twice in one list still runs once
            if applied.contains(name) {
                return Ok(());
            }

            info!("migrating {} (batch {})", name, batch);
            migration.up(&schema).map_err(|e| wrap(name, e))?;
            self.db
                .table(MIGRATIONS_TABLE)
                .insert(&record! { "migration" => name, "batch" => batch })?;

            applied.insert(name.to_string());
            ran.push(name.to_string());
            self.db.emit(LifecycleEvent::MigrationApplied {
                name: name.to_string(),
                batch,
            });
            Ok(())
        });

        self.db.clear_schema_cache(None);
        result.map(|_| ran)
    }

    /// Reverse the most recent batch, newest migration first.
    ///
    /// Ledger entries whose definition is not in `migrations` are skipped and
    /// stay recorded.
    pub fn rollback(&self, migrations: &[Box<dyn Migration>]) -> DataResult<Vec<String>> {
        let batch = self.last_batch()?;
        if batch == 0 {
            info!("nothing to roll back");
            return Ok(Vec::new());
        }

        let mut records: Vec<MigrationRecord> = self
            .applied()?
            .into_iter()
            .filter(|r| r.batch == batch)
            .collect();
        records.reverse();
        self.reverse(&records, migrations)
    }

    /// Reverse every applied migration, newest batch first
    pub fn reset(&self, migrations: &[Box<dyn Migration>]) -> DataResult<Vec<String>> {
        let mut records = self.applied()?;
        records.sort_by(|a, b| b.batch.cmp(&a.batch).then(b.id.cmp(&a.id)));
        self.reverse(&records, migrations)
    }

    /// Reset, then run everything again
    pub fn refresh(&self, migrations: &[Box<dyn Migration>]) -> DataResult<Vec<String>> {
        self.reset(migrations)?;
        self.run(migrations)
    }

    /// Applied/pending state of each migration in `migrations`
    pub fn status(&self, migrations: &[Box<dyn Migration>]) -> DataResult<Vec<MigrationStatus>> {
        let applied = self.applied()?;
        Ok(migrations
            .iter()
            .map(|m| MigrationStatus {
                name: m.name().to_string(),
                batch: applied
                    .iter()
                    .find(|r| r.migration == m.name())
                    .map(|r| r.batch),
            })
            .collect())
    }

    /// Names of migrations that have not run yet, in input order
    pub fn pending(&self, migrations: &[Box<dyn Migration>]) -> DataResult<Vec<String>> {
        Ok(self
            .status(migrations)?
            .into_iter()
            .filter(|s| !s.is_applied())
            .map(|s| s.name)
            .collect())
    }

    fn reverse(
        &self,
        records: &[MigrationRecord],
        migrations: &[Box<dyn Migration>],
    ) -> DataResult<Vec<String>> {
        let schema = Schema::new(self.db);
        let mut reverted = Vec::with_capacity(records.len());

        let result = records.iter().try_for_each(|record| -> DataResult<()> {
            let Some(migration) = migrations.iter().find(|m| m.name() == record.migration) else {
                warn!(
                    "migration {} is recorded but has no definition, skipping",
                    record.migration
                );
                return Ok(());
            };

            info!("rolling back {}", record.migration);
            migration
                .down(&schema)
                .map_err(|e| wrap(&record.migration, e))?;
            self.db
                .table(MIGRATIONS_TABLE)
                .where_eq("id", Value::Integer(record.id))
                .delete()?;

            reverted.push(record.migration.clone());
            self.db.emit(LifecycleEvent::MigrationRolledBack {
                name: record.migration.clone(),
            });
            Ok(())
        });

        self.db.clear_schema_cache(None);
        result.map(|_| reverted)
    }
}

fn wrap(name: &str, source: DataError) -> DataError {
    DataError::Migration {
        name: name.to_string(),
        source: Box::new(source),
    }
}
