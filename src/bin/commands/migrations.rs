use super::{open_database, OutputFormat};
use recordkit::database::{MigrationRecord, MIGRATIONS_TABLE};
use recordkit::{Migrator, RecordkitConfig};
use tabled::Table;

/// Show the migration ledger of the configured database.
///
/// The binary has no migration definitions of its own, so this reports what
/// the ledger says ran, grouped by batch.
pub fn run(config: &RecordkitConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let db = open_database(config)?;

    if !db.table_exists(MIGRATIONS_TABLE)? {
        println!("No migrations have been run ('{}' table missing).", MIGRATIONS_TABLE);
        return Ok(());
    }

    let migrator = Migrator::new(&db);
    let applied: Vec<MigrationRecord> = migrator.applied()?;

    if output_format.print_json(&applied) {
        return Ok(());
    }

    if applied.is_empty() {
        println!("Ledger is empty.");
        return Ok(());
    }
    let mut table = Table::new(&applied);
    output_format.style(&mut table);
    println!("{}", table);
    println!("Last batch: {}", migrator.last_batch()?);
    Ok(())
}
