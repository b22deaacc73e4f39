use clap::{Parser, Subcommand};
use recordkit::RecordkitConfig;
use tracing::Level;

mod commands;

use commands::config::ConfigArgs;
use commands::query::QueryArgs;
use commands::OutputFormat;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.recordkit/recordkit.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: table (default), markdown, json, json-pretty, json-line
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the loaded configuration and connections
    Config(ConfigArgs),

    /// List tables with row and column counts
    Tables,

    /// List the columns of a table
    Columns {
        /// Table to describe
        #[clap(value_name = "TABLE")]
        table: String,
    },

    /// Show the migration ledger
    Migrations,

    /// Read rows from a table through the query builder
    Query(QueryArgs),
}

fn main() {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level DEBUG or higher.
            .with_max_level(Level::DEBUG)
            .init();
    }

    let config = match RecordkitConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let format = cli.format;
    let result = match cli.command {
        Commands::Config(args) => {
            commands::config::run(&config, args, format);
            Ok(())
        }
        Commands::Tables => commands::tables::run_tables(&config, format),
        Commands::Columns { table } => commands::tables::run_columns(&config, &table, format),
        Commands::Migrations => commands::migrations::run(&config, format),
        Commands::Query(args) => commands::query::run(&config, args, format),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
