use super::OutputFormat;
use clap::Args;
use recordkit::RecordkitConfig;
use serde::Serialize;
use std::path::Path;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Also show every configured connection's file status
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    data_dir: String,
    default_connection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    connections: Option<Vec<ConnectionInfo>>,
}

#[derive(Debug, Serialize)]
struct ConnectionInfo {
    name: String,
    database: String,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
}

pub fn run(config: &RecordkitConfig, args: ConfigArgs, output_format: OutputFormat) {
    let ConfigArgs { verbose } = args;

    let connections = if verbose {
        let database = config.database_config();
        let mut list: Vec<ConnectionInfo> = database
            .connections
            .iter()
            .map(|(name, conn)| {
                let path = conn.database.clone().unwrap_or_default();
                let metadata = std::fs::metadata(Path::new(&path)).ok();
                ConnectionInfo {
                    name: name.clone(),
                    exists: metadata.is_some(),
                    size_bytes: metadata.map(|m| m.len()),
                    database: path,
                }
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Some(list)
    } else {
        None
    };

    let info = ConfigInfo {
        config_file: RecordkitConfig::config_file_path(),
        data_dir: config.data_dir.clone(),
        default_connection: config.default_connection.clone(),
        connections,
    };

    if output_format.print_json(std::slice::from_ref(&info)) {
        return;
    }

    println!("Recordkit Configuration");
    println!("=======================\n");
    println!("{}", config.summary());

    if let Some(connections) = &info.connections {
        println!();
        println!("Connection Files:");
        for conn in connections {
            let status = match conn.size_bytes {
                Some(size) => format!("{} bytes", size),
                None => "not created".to_string(),
            };
            println!("  {:<12} {} ({})", conn.name, conn.database, status);
        }
    }
}
