#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Recordkit - an embedded active-record data layer for SQLite
//!
//! Recordkit provides a connection manager with a schema cache, a declarative
//! schema builder, a fluent query builder, a ledger-backed migration runner and
//! a model layer with attribute casting, dirty tracking and local/remote
//! persistence. It can be used as a library and, with the `cli` feature, as an
//! inspection tool for recordkit databases.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Library: database, migrations, models | `rusqlite`, `serde`, `chrono` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | The `recordkit` binary | All above + `clap`, `tracing-subscriber` |
//!
//! ```toml
//! # Library only
//! recordkit = { version = "0.3", default-features = false }
//! ```
//!
//! # Architecture
//!
//! - **[`database`]**: connection management, schema builder, query builder,
//!   migrations
//! - **[`model`]**: active-record models built on the query builder
//! - **[`events`]**: one-way lifecycle notifications
//! - **[`config`]**: file and environment configuration
//! - **[`error`]**: the [`DataError`] type shared by all of the above
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use recordkit::database::{migration, ConnectionManager, DatabaseConfig, Migrator};
//!
//! let db = ConnectionManager::new(DatabaseConfig::single("app.sqlite3"));
//! db.init()?;
//!
//! let migrations = vec![migration(
//!     "2024_01_01_create_users",
//!     |schema| {
//!         schema.create("users", |t| {
//!             t.id();
//!             t.string("name");
//!             t.timestamps();
//!         })
//!     },
//!     |schema| schema.drop_if_exists("users"),
//! )];
//! Migrator::new(&db).run(&migrations)?;
//!
//! let names = db.table("users").order_by_desc("id").pluck("name")?;
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod model;

pub use config::RecordkitConfig;
pub use database::{
    ConnectionManager, DatabaseConfig, Direction, Migrator, Operator, QueryBuilder, Record,
    Schema, Value,
};
pub use error::{DataError, DataResult};
pub use events::{EventSink, LifecycleEvent, TracingEventSink};
pub use model::{
    AttributeValue, Attributes, CastType, Model, Persistence, PersistenceMode, RemoteClient,
    RemoteSync, SaveOutcome,
};
