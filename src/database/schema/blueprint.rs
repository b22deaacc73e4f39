//! Table blueprints
//!
//! A [`Blueprint`] collects column definitions, renames and drops for one
//! table and compiles them to DDL. A "create" blueprint compiles to a single
//! `CREATE TABLE IF NOT EXISTS`; a "modify" blueprint compiles to one
//! `ALTER TABLE` per operation: adds first, then renames, then drops.

use crate::database::core::{validate_identifier, ConnectionManager};
use crate::error::DataResult;
use std::fmt;

/// SQLite column affinity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Blob,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Blob => "BLOB",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Typed column default
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
}

impl DefaultValue {
    /// Render as a SQL literal: strings quoted, booleans as 1/0
    pub fn to_literal(&self) -> String {
        match self {
            DefaultValue::Null => "NULL".to_string(),
            DefaultValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            DefaultValue::Integer(i) => i.to_string(),
            DefaultValue::Real(r) => r.to_string(),
            DefaultValue::Boolean(b) => u8::from(*b).to_string(),
        }
    }
}

impl From<&str> for DefaultValue {
    fn from(v: &str) -> Self {
        DefaultValue::Text(v.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(v: String) -> Self {
        DefaultValue::Text(v)
    }
}

impl From<i64> for DefaultValue {
    fn from(v: i64) -> Self {
        DefaultValue::Integer(v)
    }
}

impl From<i32> for DefaultValue {
    fn from(v: i32) -> Self {
        DefaultValue::Integer(v as i64)
    }
}

impl From<f64> for DefaultValue {
    fn from(v: f64) -> Self {
        DefaultValue::Real(v)
    }
}

impl From<bool> for DefaultValue {
    fn from(v: bool) -> Self {
        DefaultValue::Boolean(v)
    }
}

/// One column of a blueprint
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub default: Option<DefaultValue>,
}

impl ColumnDefinition {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: false,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default: None,
        }
    }

    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = true;
        self
    }

    pub fn unique(&mut self) -> &mut Self {
        self.unique = true;
        self
    }

    pub fn primary(&mut self) -> &mut Self {
        self.primary_key = true;
        self
    }

    /// Auto-increment forces an INTEGER primary key
    pub fn auto_increment(&mut self) -> &mut Self {
        self.auto_increment = true;
        self.primary_key = true;
        self.column_type = ColumnType::Integer;
        self
    }

    pub fn default_value(&mut self, value: impl Into<DefaultValue>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    /// Compile to a column clause:
    /// `name TYPE [PRIMARY KEY] [AUTOINCREMENT] [NOT NULL] [UNIQUE] [DEFAULT literal]`
    pub fn to_sql(&self) -> DataResult<String> {
        let mut clause = format!("{} {}", validate_identifier(&self.name)?, self.column_type);
        if self.primary_key {
            clause.push_str(" PRIMARY KEY");
        }
        if self.auto_increment {
            clause.push_str(" AUTOINCREMENT");
        }
        if !self.nullable && !self.primary_key {
            clause.push_str(" NOT NULL");
        }
        if self.unique && !self.primary_key {
            clause.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            clause.push_str(" DEFAULT ");
            clause.push_str(&default.to_literal());
        }
        Ok(clause)
    }
}

/// Declarative description of a table to create or modify
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    table: String,
    creating: bool,
    columns: Vec<ColumnDefinition>,
    renames: Vec<(String, String)>,
    drops: Vec<String>,
}

impl Blueprint {
    /// Blueprint for a new table
    pub fn create(table: &str) -> Self {
        Self::new(table, true)
    }

    /// Blueprint modifying an existing table
    pub fn alter(table: &str) -> Self {
        Self::new(table, false)
    }

    fn new(table: &str, creating: bool) -> Self {
        Self {
            table: table.to_string(),
            creating,
            columns: Vec::new(),
            renames: Vec::new(),
            drops: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn is_create(&self) -> bool {
        self.creating
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Append a column of the given type
    pub fn column(&mut self, name: &str, column_type: ColumnType) -> &mut ColumnDefinition {
        self.columns.push(ColumnDefinition::new(name, column_type));
        let last = self.columns.len() - 1;
        &mut self.columns[last]
    }

    /// `id INTEGER PRIMARY KEY AUTOINCREMENT`
    pub fn id(&mut self) -> &mut ColumnDefinition {
        self.column("id", ColumnType::Integer).auto_increment()
    }

    pub fn string(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Text)
    }

    pub fn text(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Text)
    }

    pub fn integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Integer)
    }

    pub fn big_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Integer)
    }

    /// Booleans are stored as INTEGER 1/0
    pub fn boolean(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Integer)
    }

    pub fn real(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Real)
    }

    pub fn float(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Real)
    }

    pub fn blob(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Blob)
    }

    /// ISO-8601 text
    pub fn datetime(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Text)
    }

    /// JSON document stored as text
    pub fn json(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Text)
    }

    /// Nullable `created_at` and `updated_at` text columns holding ISO-8601 strings
    pub fn timestamps(&mut self) {
        self.column("created_at", ColumnType::Text).nullable();
        self.column("updated_at", ColumnType::Text).nullable();
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> &mut Self {
        self.renames.push((from.to_string(), to.to_string()));
        self
    }

    pub fn drop_column(&mut self, name: &str) -> &mut Self {
        self.drops.push(name.to_string());
        self
    }

    /// Compile to DDL, one statement per operation
    pub fn to_sql(&self) -> DataResult<Vec<String>> {
        let table = validate_identifier(&self.table)?;

        if self.creating {
            let clauses = self
                .columns
                .iter()
                .map(|c| c.to_sql())
                .collect::<DataResult<Vec<_>>>()?;
            return Ok(vec![format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                table,
                clauses.join(", ")
            )]);
        }

        let mut statements =
            Vec::with_capacity(self.columns.len() + self.renames.len() + self.drops.len());
        for column in &self.columns {
            statements.push(format!("ALTER TABLE {} ADD COLUMN {}", table, column.to_sql()?));
        }
        for (from, to) in &self.renames {
            statements.push(format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                table,
                validate_identifier(from)?,
                validate_identifier(to)?
            ));
        }
        for name in &self.drops {
            statements.push(format!(
                "ALTER TABLE {} DROP COLUMN {}",
                table,
                validate_identifier(name)?
            ));
        }
        Ok(statements)
    }

    /// Run the compiled statements in order, then invalidate the table's
    /// cached columns.
    ///
    /// The cache is cleared even when a statement fails, since earlier ALTERs
    /// in the same blueprint may already have been applied.
    pub fn execute(&self, db: &ConnectionManager) -> DataResult<()> {
        let statements = self.to_sql()?;
        let result = statements.iter().try_for_each(|sql| db.execute_schema(sql));
        db.clear_schema_cache(Some(&self.table));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_blueprint() -> Blueprint {
        let mut table = Blueprint::create("users");
        table.id();
        table.string("email").unique();
        table.string("nickname").nullable();
        table.boolean("active").default_value(true);
        table.real("score").default_value(1.5);
        table.string("role").default_value("member");
        table.timestamps();
        table
    }

    #[test]
    fn test_create_table_sql() {
        let sql = users_blueprint().to_sql().unwrap();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE IF NOT EXISTS users (\
                 id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 email TEXT NOT NULL UNIQUE, \
                 nickname TEXT, \
                 active INTEGER NOT NULL DEFAULT 1, \
                 score REAL NOT NULL DEFAULT 1.5, \
                 role TEXT NOT NULL DEFAULT 'member', \
                 created_at TEXT, \
                 updated_at TEXT)"
            ]
        );
    }

    #[test]
    fn test_compilation_is_deterministic() {
        assert_eq!(
            users_blueprint().to_sql().unwrap(),
            users_blueprint().to_sql().unwrap()
        );
    }

    #[test]
    fn test_primary_key_clause() {
        let mut column = ColumnDefinition::new("code", ColumnType::Text);
        column.primary().unique().nullable();
        assert_eq!(column.to_sql().unwrap(), "code TEXT PRIMARY KEY");
    }

    #[test]
    fn test_auto_increment_implies_integer_key() {
        let mut column = ColumnDefinition::new("seq", ColumnType::Text);
        column.auto_increment();
        assert!(column.primary_key);
        assert_eq!(column.column_type, ColumnType::Integer);
        assert_eq!(column.to_sql().unwrap(), "seq INTEGER PRIMARY KEY AUTOINCREMENT");
    }

    #[test]
    fn test_default_literals() {
        assert_eq!(DefaultValue::from("it's").to_literal(), "'it''s'");
        assert_eq!(DefaultValue::from(false).to_literal(), "0");
        assert_eq!(DefaultValue::from(42).to_literal(), "42");
        assert_eq!(DefaultValue::Null.to_literal(), "NULL");
    }

    #[test]
    fn test_alter_statement_order() {
        let mut table = Blueprint::alter("users");
        table.drop_column("legacy");
        table.rename_column("nickname", "handle");
        table.integer("age").nullable();

        assert_eq!(
            table.to_sql().unwrap(),
            vec![
                "ALTER TABLE users ADD COLUMN age INTEGER",
                "ALTER TABLE users RENAME COLUMN nickname TO handle",
                "ALTER TABLE users DROP COLUMN legacy",
            ]
        );
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let mut table = Blueprint::create("users");
        table.string("bad name");
        assert!(table.to_sql().is_err());
    }

    #[test]
    fn test_execute_clears_cache() {
        let db = ConnectionManager::open_in_memory().unwrap();
        users_blueprint().execute(&db).unwrap();
        assert_eq!(db.get_columns("users").unwrap().len(), 8);

        let mut alter = Blueprint::alter("users");
        alter.integer("age").nullable();
        alter.execute(&db).unwrap();

        assert!(!db.is_cached("users"));
        assert!(db.get_columns("users").unwrap().contains(&"age".to_string()));
    }
}
