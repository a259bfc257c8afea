use log::{debug, info};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::utils::error::ConfigError;

pub const MIN_BAUD_RATE: u32 = 1200;
pub const MAX_BAUD_RATE: u32 = 115_200;
/// One sample a day is the slowest cadence the logger accepts.
pub const MAX_INTERVAL_SECONDS: i64 = 86_400;

// Raw document as written by the dashboard. Legacy spellings are accepted as aliases.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(alias = "modbus")]
    device: RawDevice,
    #[serde(alias = "mysql")]
    storage: RawStorage,
    interval: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDevice {
    port: String,
    #[serde(alias = "baudrate")]
    baud_rate: i64,
    #[serde(alias = "stopbits")]
    stop_bits: i64,
    parity: String,
    #[serde(alias = "bytesize")]
    data_bits: i64,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default = "default_slave_id")]
    slave_id: u8,
    #[serde(default)]
    start_address: u16,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStorage {
    #[serde(default)]
    driver: Option<String>,
    #[serde(default)]
    host: String,
    #[serde(default = "default_db_port")]
    port: u16,
    #[serde(default)]
    user: String,
    #[serde(default)]
    password: String,
    database: String,
    #[serde(default = "default_table")]
    table: String,
}

impl fmt::Debug for RawStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawStorage")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_slave_id() -> u8 {
    1
}

fn default_db_port() -> u16 {
    3306
}

fn default_table() -> String {
    "vfd".to_string()
}

/// Validated configuration for one logger run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub device: DeviceConfig,
    pub storage: StorageConfig,
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub port: String,
    pub baud_rate: u32,
    pub stop_bits: StopBitsConfig,
    pub parity: ParityConfig,
    pub data_bits: DataBitsConfig,
    pub timeout_ms: u64,
    pub slave_id: u8,
    pub start_address: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParityConfig {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBitsConfig {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBitsConfig {
    Seven,
    Eight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageDriver {
    MySql,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

#[derive(Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub driver: StorageDriver,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub table: String,
}

// Keep the password out of logs.
impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("table", &self.table)
            .finish()
    }
}

impl StorageConfig {
    /// Human-readable endpoint used in logs and status messages.
    pub fn endpoint(&self) -> String {
        match self.driver {
            StorageDriver::MySql => {
                format!("mysql://{}@{}:{}/{}", self.user, self.host, self.port, self.database)
            }
            #[cfg(feature = "sqlite")]
            StorageDriver::Sqlite => format!("sqlite:{}", self.database),
        }
    }
}

impl DeviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Load and validate a configuration document. `.toml` files are parsed as TOML,
    /// everything else as JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("📄 Loading configuration from {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(content)?;
        Self::validate(raw)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        debug!("Validating raw configuration: {:?}", raw);

        if raw.interval < 1 || raw.interval > MAX_INTERVAL_SECONDS {
            return Err(ConfigError::invalid(
                "interval",
                format!(
                    "must be between 1 and {} seconds, got {}",
                    MAX_INTERVAL_SECONDS, raw.interval
                ),
            ));
        }

        let device = validate_device(raw.device)?;
        let storage = validate_storage(raw.storage)?;

        Ok(Self {
            device,
            storage,
            interval_seconds: raw.interval as u64,
        })
    }
}

fn validate_device(raw: RawDevice) -> Result<DeviceConfig, ConfigError> {
    if raw.port.trim().is_empty() {
        return Err(ConfigError::invalid("device.port", "must not be empty"));
    }

    if raw.baud_rate < i64::from(MIN_BAUD_RATE) || raw.baud_rate > i64::from(MAX_BAUD_RATE) {
        return Err(ConfigError::invalid(
            "device.baudRate",
            format!(
                "{} is outside the supported range {}..={}",
                raw.baud_rate, MIN_BAUD_RATE, MAX_BAUD_RATE
            ),
        ));
    }

    let stop_bits = match raw.stop_bits {
        1 => StopBitsConfig::One,
        2 => StopBitsConfig::Two,
        other => {
            return Err(ConfigError::invalid(
                "device.stopBits",
                format!("expected 1 or 2, got {}", other),
            ))
        }
    };

    let parity = match raw.parity.trim().to_ascii_uppercase().as_str() {
        "N" | "NONE" => ParityConfig::None,
        "E" | "EVEN" => ParityConfig::Even,
        "O" | "ODD" => ParityConfig::Odd,
        _ => {
            return Err(ConfigError::invalid(
                "device.parity",
                format!("expected N, E or O, got {:?}", raw.parity),
            ))
        }
    };

    let data_bits = match raw.data_bits {
        7 => DataBitsConfig::Seven,
        8 => DataBitsConfig::Eight,
        other => {
            return Err(ConfigError::invalid(
                "device.dataBits",
                format!("expected 7 or 8, got {}", other),
            ))
        }
    };

    if raw.timeout_ms == 0 {
        return Err(ConfigError::invalid("device.timeoutMs", "must be at least 1 ms"));
    }

    if raw.slave_id == 0 || raw.slave_id > 247 {
        return Err(ConfigError::invalid(
            "device.slaveId",
            format!("{} is not a valid Modbus unit id (1-247)", raw.slave_id),
        ));
    }

    Ok(DeviceConfig {
        port: raw.port,
        baud_rate: raw.baud_rate as u32,
        stop_bits,
        parity,
        data_bits,
        timeout_ms: raw.timeout_ms,
        slave_id: raw.slave_id,
        start_address: raw.start_address,
    })
}

fn validate_storage(raw: RawStorage) -> Result<StorageConfig, ConfigError> {
    let driver = match raw.driver.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("mysql") => StorageDriver::MySql,
        #[cfg(feature = "sqlite")]
        Some("sqlite") => StorageDriver::Sqlite,
        Some(other) => {
            return Err(ConfigError::invalid(
                "storage.driver",
                format!("unsupported driver {:?}", other),
            ))
        }
    };

    if driver == StorageDriver::MySql {
        if raw.host.trim().is_empty() {
            return Err(ConfigError::invalid("storage.host", "must not be empty"));
        }
        if raw.user.trim().is_empty() {
            return Err(ConfigError::invalid("storage.user", "must not be empty"));
        }
    }

    if raw.database.trim().is_empty() {
        return Err(ConfigError::invalid("storage.database", "must not be empty"));
    }

    if !is_sql_identifier(&raw.table) {
        return Err(ConfigError::invalid(
            "storage.table",
            format!("{:?} is not a plain SQL identifier", raw.table),
        ));
    }

    Ok(StorageConfig {
        driver,
        host: raw.host,
        port: raw.port,
        user: raw.user,
        password: raw.password,
        database: raw.database,
        table: raw.table,
    })
}

// The table name is spliced into SQL text, so only plain identifiers pass.
fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DASHBOARD_JSON: &str = r#"{
        "modbus": {
            "port": "COM3",
            "baudrate": 9600,
            "stopbits": 1,
            "parity": "N",
            "bytesize": 8
        },
        "mysql": {
            "host": "localhost",
            "user": "root",
            "password": "secret",
            "database": "iasys"
        },
        "interval": 1
    }"#;

    #[test]
    fn parses_dashboard_document() {
        let config = Config::from_json_str(DASHBOARD_JSON).unwrap();
        assert_eq!(config.device.port, "COM3");
        assert_eq!(config.device.baud_rate, 9600);
        assert_eq!(config.device.stop_bits, StopBitsConfig::One);
        assert_eq!(config.device.parity, ParityConfig::None);
        assert_eq!(config.device.data_bits, DataBitsConfig::Eight);
        assert_eq!(config.device.slave_id, 1);
        assert_eq!(config.device.timeout(), Duration::from_millis(1000));
        assert_eq!(config.storage.driver, StorageDriver::MySql);
        assert_eq!(config.storage.table, "vfd");
        assert_eq!(config.storage.port, 3306);
        assert_eq!(config.interval(), Duration::from_secs(1));
    }

    #[test]
    fn parses_camel_case_toml() {
        let content = r#"
            interval = 5

            [device]
            port = "/dev/ttyUSB0"
            baudRate = 19200
            stopBits = 2
            parity = "even"
            dataBits = 7
            slaveId = 3
            startAddress = 100

            [storage]
            host = "db.plant"
            user = "logger"
            password = "pw"
            database = "plant"
            table = "drive_1"
        "#;
        let config = Config::from_toml_str(content).unwrap();
        assert_eq!(config.interval_seconds, 5);
        assert_eq!(config.device.stop_bits, StopBitsConfig::Two);
        assert_eq!(config.device.parity, ParityConfig::Even);
        assert_eq!(config.device.data_bits, DataBitsConfig::Seven);
        assert_eq!(config.device.start_address, 100);
        assert_eq!(config.storage.table, "drive_1");
    }

    #[test]
    fn rejects_non_positive_interval() {
        let content = DASHBOARD_JSON.replace("\"interval\": 1", "\"interval\": 0");
        let err = Config::from_json_str(&content).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "interval", .. }));
    }

    #[test]
    fn rejects_interval_beyond_one_day() {
        let content = DASHBOARD_JSON.replace("\"interval\": 1", "\"interval\": 9223372036854775807");
        let err = Config::from_json_str(&content).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "interval", .. }));

        let content = DASHBOARD_JSON.replace("\"interval\": 1", "\"interval\": 86400");
        let config = Config::from_json_str(&content).unwrap();
        assert_eq!(config.interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn rejects_out_of_range_baud_rate() {
        let content = DASHBOARD_JSON.replace("9600", "250000");
        let err = Config::from_json_str(&content).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "device.baudRate", .. }));
    }

    #[test]
    fn rejects_values_outside_enumerated_sets() {
        let cases = [
            ("\"stopbits\": 1", "\"stopbits\": 3", "device.stopBits"),
            ("\"parity\": \"N\"", "\"parity\": \"M\"", "device.parity"),
            ("\"bytesize\": 8", "\"bytesize\": 6", "device.dataBits"),
        ];
        for (from, to, field) in cases {
            let content = DASHBOARD_JSON.replace(from, to);
            match Config::from_json_str(&content) {
                Err(ConfigError::Invalid { field: got, .. }) => assert_eq!(got, field),
                other => panic!("expected {} to be rejected, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn missing_field_is_named() {
        let content = DASHBOARD_JSON.replace("\"port\": \"COM3\",", "");
        let err = Config::from_json_str(&content).unwrap_err();
        assert!(err.to_string().contains("port"), "{}", err);
    }

    #[test]
    fn rejects_table_names_that_are_not_identifiers() {
        let content = DASHBOARD_JSON.replace(
            "\"database\": \"iasys\"",
            "\"database\": \"iasys\", \"table\": \"vfd; DROP TABLE vfd\"",
        );
        let err = Config::from_json_str(&content).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "storage.table", .. }));
    }

    #[test]
    fn debug_output_hides_password() {
        let config = Config::from_json_str(DASHBOARD_JSON).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn reads_from_file_and_reports_missing_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(DASHBOARD_JSON.as_bytes()).unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.storage.database, "iasys");

        let err = Config::from_file("/nonexistent/vfd/config.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
