use super::{open_database, OutputFormat};
use recordkit::RecordkitConfig;
use serde::Serialize;
use tabled::{Table, Tabled};

#[derive(Debug, Serialize, Tabled)]
struct TableInfo {
    table: String,
    rows: u64,
    columns: usize,
}

#[derive(Debug, Serialize, Tabled)]
struct ColumnInfo {
    position: usize,
    column: String,
}

/// List user tables with row and column counts
pub fn run_tables(config: &RecordkitConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let db = open_database(config)?;

    let mut tables = Vec::new();
    for name in db.table_names()? {
        tables.push(TableInfo {
            rows: db.table_count(&name)?,
            columns: db.get_columns(&name)?.len(),
            table: name,
        });
    }

    if !output_format.print_json(&tables) {
        if tables.is_empty() {
            println!("No tables found.");
            return Ok(());
        }
        let mut table = Table::new(&tables);
        output_format.style(&mut table);
        println!("{}", table);
    }
    Ok(())
}

/// List the columns of one table in declaration order
pub fn run_columns(
    config: &RecordkitConfig,
    table_name: &str,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let db = open_database(config)?;
    if !db.table_exists(table_name)? {
        return Err(anyhow::anyhow!("Table '{}' does not exist", table_name));
    }

    let columns: Vec<ColumnInfo> = db
        .get_columns(table_name)?
        .into_iter()
        .enumerate()
        .map(|(position, column)| ColumnInfo { position, column })
        .collect();

    if !output_format.print_json(&columns) {
        let mut table = Table::new(&columns);
        output_format.style(&mut table);
        println!("{}", table);
    }
    Ok(())
}
