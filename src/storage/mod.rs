pub mod models;
pub mod sql_store;

pub use models::Reading;
pub use sql_store::{ReadingStore, SqlConnector, SqlStore, StorageConnector};
