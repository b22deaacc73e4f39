use super::{open_database, truncate_cell, OutputFormat, DEFAULT_CELL_MAX_LEN};
use anyhow::{anyhow, Result};
use clap::Args;
use recordkit::database::{Direction, Operator};
use recordkit::{QueryBuilder, RecordkitConfig, Value};
use tabled::builder::Builder;

/// Arguments for the Query command
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Table to read
    #[clap(value_name = "TABLE")]
    pub table: String,

    /// Comma-separated list of columns to return
    #[clap(short, long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Filter, e.g. "age >= 30", "name like A%", "email is null"; repeatable
    #[clap(short, long = "where", value_name = "CONDITION")]
    pub conditions: Vec<String>,

    /// Sort by column
    #[clap(short, long)]
    pub order_by: Option<String>,

    /// Sort descending
    #[clap(long)]
    pub desc: bool,

    /// Maximum number of rows
    #[clap(short, long)]
    pub limit: Option<u64>,

    /// Rows to skip
    #[clap(long)]
    pub offset: Option<u64>,

    /// Print the number of matching rows instead of the rows
    #[clap(long)]
    pub count: bool,

    /// Print the generated SQL and bindings without running it
    #[clap(long)]
    pub dry_run: bool,
}

#[derive(Debug, PartialEq)]
enum Condition {
    Compare(String, Operator, Value),
    Null(String, bool),
}

/// Literal typing for CLI values: integers, then reals, then text
fn parse_value(raw: &str) -> Value {
    let raw = raw.trim();
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Real(f);
    }
    let unquoted = raw
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(raw);
    Value::from(unquoted)
}

fn parse_condition(text: &str) -> Result<Condition> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let invalid = || anyhow!("Invalid condition '{}', expected: <column> <op> <value>", text);
    let column = tokens.first().ok_or_else(invalid)?.to_string();
    let rest: Vec<String> = tokens[1..].iter().map(|t| t.to_ascii_lowercase()).collect();

    match rest.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["is", "null"] => return Ok(Condition::Null(column, false)),
        ["is", "not", "null"] => return Ok(Condition::Null(column, true)),
        _ => {}
    }

    let (op_len, op) = if rest.len() >= 3 && rest[0] == "not" && rest[1] == "like" {
        (2, Operator::NotLike)
    } else {
        let op_text = tokens.get(1).ok_or_else(invalid)?;
        (1, op_text.parse::<Operator>()?)
    };

    let value = tokens[1 + op_len..].join(" ");
    if value.is_empty() {
        return Err(invalid());
    }
    Ok(Condition::Compare(column, op, parse_value(&value)))
}

fn build_query<'a>(
    db: &'a recordkit::ConnectionManager,
    args: &QueryArgs,
) -> Result<QueryBuilder<'a>> {
    let mut query = db.table(&args.table);

    if !args.select.is_empty() {
        let columns: Vec<&str> = args.select.iter().map(String::as_str).collect();
        query = query.select(&columns);
    }
    for text in &args.conditions {
        query = match parse_condition(text)? {
            Condition::Compare(column, op, value) => query.where_op(&column, op, value),
            Condition::Null(column, false) => query.where_null(&column),
            Condition::Null(column, true) => query.where_not_null(&column),
        };
    }
    if let Some(column) = &args.order_by {
        query = if args.desc {
            query.order_by_desc(column)
        } else {
            query.order_by(column, Direction::Asc)
        };
    }
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = args.offset {
        query = query.offset(offset);
    }
    Ok(query)
}

pub fn run(config: &RecordkitConfig, args: QueryArgs, output_format: OutputFormat) -> Result<()> {
    let db = open_database(config)?;
    if !db.table_exists(&args.table)? {
        return Err(anyhow!("Table '{}' does not exist", args.table));
    }
    let query = build_query(&db, &args)?;

    if args.dry_run {
        let compiled = query.to_sql()?;
        println!("{}", compiled.sql);
        let bindings: Vec<String> = compiled.bindings.iter().map(|v| v.to_string()).collect();
        println!("-- bindings: [{}]", bindings.join(", "));
        return Ok(());
    }

    if args.count {
        println!("{}", query.count()?);
        return Ok(());
    }

    let rows = query.get()?;
    let json_rows: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| {
            serde_json::Value::Object(
                row.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            )
        })
        .collect();
    if output_format.print_json(&json_rows) {
        return Ok(());
    }

    if rows.is_empty() {
        println!("No rows.");
        return Ok(());
    }

    // Records are keyed maps; keep the table's column order for display
    let header: Vec<String> = if args.select.is_empty() {
        db.get_columns(&args.table)?
    } else {
        args.select.clone()
    };
    let mut builder = Builder::default();
    builder.push_record(header.clone());
    for row in &rows {
        builder.push_record(header.iter().map(|column| {
            let cell = row.get(column).map(|v| v.to_string()).unwrap_or_default();
            truncate_cell(&cell, DEFAULT_CELL_MAX_LEN)
        }));
    }
    let mut table = builder.build();
    output_format.style(&mut table);
    println!("{}", table);
    println!("{} row(s)", rows.len());
    Ok(())
}
