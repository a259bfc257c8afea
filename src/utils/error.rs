use thiserror::Error;

/// Configuration could not be loaded. Fatal: a bad document is not transient.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(String),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid { field, reason: reason.into() }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(format!("TOML error: {}", err))
    }
}

/// Startup connection failure, distinct per endpoint.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Modbus device connection on {endpoint} failed: {reason}")]
    Device { endpoint: String, reason: String },

    #[error("storage connection to {endpoint} failed: {reason}")]
    Storage { endpoint: String, reason: String },
}

/// Outcome of a register block read that did not produce a reading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("Only got {got} registers, expected {expected}")]
    ShortRead { got: usize, expected: usize },

    #[error("Modbus read error: {0}")]
    Transport(String),
}

impl From<std::io::Error> for ReadError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::UnexpectedEof => {
                ReadError::Transport("no response".to_string())
            }
            _ => ReadError::Transport(format!("IO error: {}", err)),
        }
    }
}

/// A single-row insert that did not commit.
#[derive(Error, Debug)]
pub enum InsertError {
    #[error("row rejected by database: {0}")]
    Rejected(String),

    #[error("database connection lost: {0}")]
    ConnectionLost(String),

    #[error("reading has {got} registers but table maps {expected} columns")]
    Shape { got: usize, expected: usize },
}

impl From<sqlx::Error> for InsertError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => InsertError::Rejected(db.to_string()),
            other => InsertError::ConnectionLost(other.to_string()),
        }
    }
}

/// Errors that reach the process boundary.
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Unexpected error: {0}")]
    Fault(String),
}
