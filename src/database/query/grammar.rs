//! SQL text generation for the query builder

use crate::database::core::{validate_identifier, Record, Value};
use crate::error::{DataError, DataResult};
use std::fmt;
use std::str::FromStr;

/// Comparison operators accepted in WHERE predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }
}

impl FromStr for Operator {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "=" | "==" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::NotEq),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Gte),
            "LIKE" => Ok(Operator::Like),
            "NOT LIKE" => Ok(Operator::NotLike),
            _ => Err(DataError::InvalidOperator(s.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            _ => Err(DataError::InvalidOperator(s.to_string())),
        }
    }
}

/// A single WHERE predicate
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Predicate {
    Compare {
        column: String,
        op: Operator,
        value: Value,
    },
    Null {
        column: String,
        negated: bool,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
}

/// SQL text plus its positional bindings
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
}

/// Append ` WHERE a = ? AND b IS NULL ...` and push the bound values
fn push_wheres(sql: &mut String, bindings: &mut Vec<Value>, wheres: &[Predicate]) -> DataResult<()> {
    let mut clauses = Vec::with_capacity(wheres.len());
    for predicate in wheres {
        match predicate {
            Predicate::Compare { column, op, value } => {
                clauses.push(format!("{} {} ?", validate_identifier(column)?, op));
                bindings.push(value.clone());
            }
            Predicate::Null { column, negated } => {
                let check = if *negated { "IS NOT NULL" } else { "IS NULL" };
                clauses.push(format!("{} {}", validate_identifier(column)?, check));
            }
            Predicate::In { column, values } => {
                let placeholders = vec!["?"; values.len()].join(", ");
                clauses.push(format!("{} IN ({})", validate_identifier(column)?, placeholders));
                bindings.extend(values.iter().cloned());
            }
        }
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    Ok(())
}

pub(crate) fn compile_select(
    table: &str,
    columns: Option<&[String]>,
    wheres: &[Predicate],
    orders: &[(String, Direction)],
    limit: Option<u64>,
    offset: Option<u64>,
) -> DataResult<CompiledQuery> {
    let projection = match columns {
        Some(columns) if !columns.is_empty() => columns
            .iter()
            .map(|c| validate_identifier(c))
            .collect::<DataResult<Vec<_>>>()?
            .join(", "),
        _ => "*".to_string(),
    };

    let mut sql = format!("SELECT {} FROM {}", projection, validate_identifier(table)?);
    let mut bindings = Vec::new();
    push_wheres(&mut sql, &mut bindings, wheres)?;

    if !orders.is_empty() {
        let keys = orders
            .iter()
            .map(|(column, direction)| {
                validate_identifier(column).map(|c| format!("{} {}", c, direction.as_sql()))
            })
            .collect::<DataResult<Vec<_>>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&keys.join(", "));
    }

    match (limit, offset) {
        (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
        (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
        // SQLite only accepts OFFSET after a LIMIT
        (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
        (None, None) => {}
    }

    Ok(CompiledQuery { sql, bindings })
}

pub(crate) fn compile_count(table: &str, wheres: &[Predicate]) -> DataResult<CompiledQuery> {
    let mut sql = format!("SELECT COUNT(*) FROM {}", validate_identifier(table)?);
    let mut bindings = Vec::new();
    push_wheres(&mut sql, &mut bindings, wheres)?;
    Ok(CompiledQuery { sql, bindings })
}

pub(crate) fn compile_exists(table: &str, wheres: &[Predicate]) -> DataResult<CompiledQuery> {
    let mut sql = format!("SELECT EXISTS(SELECT 1 FROM {}", validate_identifier(table)?);
    let mut bindings = Vec::new();
    push_wheres(&mut sql, &mut bindings, wheres)?;
    sql.push(')');
    Ok(CompiledQuery { sql, bindings })
}

pub(crate) fn compile_insert(table: &str, values: &[(String, Value)]) -> DataResult<CompiledQuery> {
    let table = validate_identifier(table)?;
    if values.is_empty() {
        return Ok(CompiledQuery {
            sql: format!("INSERT INTO {} DEFAULT VALUES", table),
            bindings: Vec::new(),
        });
    }

    let columns = values
        .iter()
        .map(|(c, _)| validate_identifier(c))
        .collect::<DataResult<Vec<_>>>()?;
    let placeholders = vec!["?"; values.len()].join(", ");
    Ok(CompiledQuery {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        ),
        bindings: values.iter().map(|(_, v)| v.clone()).collect(),
    })
}

pub(crate) fn compile_insert_all(
    table: &str,
    columns: &[String],
    records: &[Record],
) -> DataResult<CompiledQuery> {
    let table = validate_identifier(table)?;
    if columns.is_empty() {
        // No known column: every record becomes a row of defaults
        let rows = vec!["SELECT NULL"; records.len()].join(" UNION ALL ");
        return Ok(CompiledQuery {
            sql: format!("INSERT INTO {} (rowid) {}", table, rows),
            bindings: Vec::new(),
        });
    }

    let names = columns
        .iter()
        .map(|c| validate_identifier(c))
        .collect::<DataResult<Vec<_>>>()?;
    let row = format!("({})", vec!["?"; columns.len()].join(", "));
    let rows = vec![row.as_str(); records.len()].join(", ");

    let mut bindings = Vec::with_capacity(columns.len() * records.len());
    for record in records {
        for column in columns {
            bindings.push(record.get(column).cloned().unwrap_or(Value::Null));
        }
    }

    Ok(CompiledQuery {
        sql: format!("INSERT INTO {} ({}) VALUES {}", table, names.join(", "), rows),
        bindings,
    })
}

pub(crate) fn compile_update(
    table: &str,
    values: &[(String, Value)],
    wheres: &[Predicate],
) -> DataResult<CompiledQuery> {
    let assignments = values
        .iter()
        .map(|(c, _)| validate_identifier(c).map(|c| format!("{} = ?", c)))
        .collect::<DataResult<Vec<_>>>()?;

    let mut sql = format!(
        "UPDATE {} SET {}",
        validate_identifier(table)?,
        assignments.join(", ")
    );
    let mut bindings: Vec<Value> = values.iter().map(|(_, v)| v.clone()).collect();
    push_wheres(&mut sql, &mut bindings, wheres)?;
    Ok(CompiledQuery { sql, bindings })
}

pub(crate) fn compile_delete(table: &str, wheres: &[Predicate]) -> DataResult<CompiledQuery> {
    let mut sql = format!("DELETE FROM {}", validate_identifier(table)?);
    let mut bindings = Vec::new();
    push_wheres(&mut sql, &mut bindings, wheres)?;
    Ok(CompiledQuery { sql, bindings })
}
