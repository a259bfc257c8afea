use clap::Parser;
use std::path::{Path, PathBuf};

const STATUS_FILE_NAME: &str = "status.json";

/// Samples a variable-frequency drive over Modbus RTU and appends one row per
/// interval to a SQL table.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Args {
    /// Configuration document (.json or .toml)
    #[clap(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Status file for the dashboard [default: status.json beside the config]
    #[clap(long)]
    pub status: Option<PathBuf>,

    /// Log filter when RUST_LOG is not set
    #[clap(long, default_value = "info")]
    pub log_level: String,

    /// Print the available serial ports and exit
    #[clap(long)]
    pub list_ports: bool,
}

impl Args {
    pub fn status_path(&self) -> PathBuf {
        match &self.status {
            Some(path) => path.clone(),
            None => self
                .config
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(STATUS_FILE_NAME),
        }
    }
}
