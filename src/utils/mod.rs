pub mod error;

pub use error::{ConfigError, ConnectError, InsertError, LoggerError, ReadError};
