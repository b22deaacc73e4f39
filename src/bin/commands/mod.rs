pub mod config;
pub mod migrations;
pub mod query;
pub mod tables;

use recordkit::{ConnectionManager, RecordkitConfig};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tabled::settings::Style;
use tabled::Table;

/// Default maximum length for cell values in tables
pub const DEFAULT_CELL_MAX_LEN: usize = 40;

/// Output format shared by all commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty table with borders (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
    /// JSON Lines format (one JSON object per line)
    JsonLine,
}

impl OutputFormat {
    pub fn all_names() -> &'static [&'static str] {
        &["table", "markdown", "json", "json-pretty", "json-line"]
    }

    /// Apply this format's style to a table
    pub fn style(&self, table: &mut Table) {
        match self {
            OutputFormat::Markdown => {
                table.with(Style::markdown());
            }
            _ => {
                table.with(Style::rounded());
            }
        }
    }

    /// Print `items` as JSON in this format; returns false for table formats
    pub fn print_json<T: Serialize>(&self, items: &[T]) -> bool {
        let rendered = match self {
            OutputFormat::Json => serde_json::to_string(items).map(|s| vec![s]),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(items).map(|s| vec![s]),
            OutputFormat::JsonLine => items
                .iter()
                .map(serde_json::to_string)
                .collect::<Result<Vec<_>, _>>(),
            OutputFormat::Table | OutputFormat::Markdown => return false,
        };
        match rendered {
            Ok(lines) => lines.iter().for_each(|line| println!("{}", line)),
            Err(e) => eprintln!("Error serializing output: {}", e),
        }
        true
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
            Self::JsonLine => write!(f, "json-line"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "json-line" | "jsonline" | "jsonl" | "ndjson" => Ok(Self::JsonLine),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// Truncate a string to the specified length, adding "..." if truncated
pub fn truncate_cell(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        value.to_string()
    } else {
        let truncated: String = value.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Open the configured default connection
pub fn open_database(config: &RecordkitConfig) -> anyhow::Result<ConnectionManager> {
    let db = ConnectionManager::new(config.database_config());
    db.init()?;
    Ok(db)
}
