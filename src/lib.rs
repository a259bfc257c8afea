//! VFD register logger
//!
//! Polls a variable-frequency drive over Modbus RTU once per interval and
//! appends each complete register block, stamped with local time, to a SQL
//! table. A small JSON status document tells the dashboard what the logger is
//! doing.

pub mod cli;
pub mod config;
pub mod devices;
pub mod modbus;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use devices::{DeviceConnector, RegisterDevice, SerialConnector};
pub use modbus::ModbusClient;
pub use services::{run_logger, AcquisitionLoop, Status, StatusFile, StatusSink};
pub use storage::{Reading, ReadingStore, SqlConnector, StorageConnector};
pub use utils::error::{ConfigError, ConnectError, InsertError, LoggerError, ReadError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
