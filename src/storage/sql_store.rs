use async_trait::async_trait;
use log::{debug, error, info};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::time::Duration;

use crate::config::settings::{StorageConfig, StorageDriver};
use crate::storage::models::{Reading, REGISTER_COLUMNS, TIMESTAMP_COLUMN};
use crate::utils::error::{ConnectError, InsertError};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens a database session against the readings table.
#[async_trait]
pub trait StorageConnector: Send + Sync {
    type Store: ReadingStore;

    async fn connect(&self, config: &StorageConfig) -> Result<Self::Store, ConnectError>;
}

/// An open session, exclusively owned by the acquisition loop.
#[async_trait]
pub trait ReadingStore: Send {
    /// Append one row in its own transaction. Returns the affected row count.
    async fn insert_reading(&mut self, reading: &Reading) -> Result<u64, InsertError>;

    /// Release the session. Idempotent.
    async fn close(&mut self);
}

enum Backend {
    MySql(MySqlPool),
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePool),
}

impl Backend {
    async fn close(self) {
        match self {
            Backend::MySql(pool) => pool.close().await,
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(pool) => pool.close().await,
        }
    }
}

/// sqlx-backed connector; the driver comes from `storage.driver`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlConnector;

#[async_trait]
impl StorageConnector for SqlConnector {
    type Store = SqlStore;

    async fn connect(&self, config: &StorageConfig) -> Result<SqlStore, ConnectError> {
        let endpoint = config.endpoint();
        info!("🗄️  Connecting to database: {}", endpoint);

        let storage_error = |e: sqlx::Error| {
            error!("❌ Database connection to {} failed: {}", endpoint, e);
            ConnectError::Storage {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            }
        };

        // One connection is the whole session; rows are written one at a time.
        let backend = match config.driver {
            StorageDriver::MySql => {
                let options = MySqlConnectOptions::new()
                    .host(&config.host)
                    .port(config.port)
                    .username(&config.user)
                    .password(&config.password)
                    .database(&config.database);

                let pool = MySqlPoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(ACQUIRE_TIMEOUT)
                    .connect_with(options)
                    .await
                    .map_err(storage_error)?;
                Backend::MySql(pool)
            }
            #[cfg(feature = "sqlite")]
            StorageDriver::Sqlite => {
                let options = SqliteConnectOptions::new()
                    .filename(&config.database)
                    .create_if_missing(false);

                let pool = SqlitePoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(ACQUIRE_TIMEOUT)
                    .connect_with(options)
                    .await
                    .map_err(storage_error)?;
                Backend::Sqlite(pool)
            }
        };

        let mut store = SqlStore::new(backend, &config.table, endpoint.clone());

        // The schema is provisioned elsewhere; a missing table is a startup failure.
        if let Err(e) = store.verify_table(&config.table).await {
            store.close().await;
            return Err(storage_error(e));
        }

        info!("✅ Database connection successful ({})", endpoint);
        Ok(store)
    }
}

pub struct SqlStore {
    backend: Option<Backend>,
    insert_sql: String,
    endpoint: String,
}

impl SqlStore {
    fn new(backend: Backend, table: &str, endpoint: String) -> Self {
        Self {
            backend: Some(backend),
            insert_sql: insert_statement(table),
            endpoint,
        }
    }

    async fn verify_table(&self, table: &str) -> Result<(), sqlx::Error> {
        let probe = format!("SELECT 1 FROM {} LIMIT 0", table);
        match &self.backend {
            Some(Backend::MySql(pool)) => {
                sqlx::query(&probe).execute(pool).await?;
            }
            #[cfg(feature = "sqlite")]
            Some(Backend::Sqlite(pool)) => {
                sqlx::query(&probe).execute(pool).await?;
            }
            None => return Err(sqlx::Error::PoolClosed),
        }
        Ok(())
    }
}

#[async_trait]
impl ReadingStore for SqlStore {
    async fn insert_reading(&mut self, reading: &Reading) -> Result<u64, InsertError> {
        if reading.registers().len() != REGISTER_COLUMNS.len() {
            return Err(InsertError::Shape {
                got: reading.registers().len(),
                expected: REGISTER_COLUMNS.len(),
            });
        }

        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| InsertError::ConnectionLost("storage session is closed".to_string()))?;

        // Executed outside an explicit transaction: autocommit makes the row durable
        // when execute returns.
        let rows = match backend {
            Backend::MySql(pool) => {
                let mut query = sqlx::query(&self.insert_sql).bind(reading.timestamp());
                for value in reading.registers() {
                    query = query.bind(i32::from(*value));
                }
                query.execute(pool).await?.rows_affected()
            }
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query(&self.insert_sql).bind(reading.formatted_timestamp());
                for value in reading.registers() {
                    query = query.bind(i32::from(*value));
                }
                query.execute(pool).await?.rows_affected()
            }
        };

        debug!("💾 Inserted reading {} ({} row)", reading.formatted_timestamp(), rows);
        Ok(rows)
    }

    async fn close(&mut self) {
        if let Some(backend) = self.backend.take() {
            backend.close().await;
            info!("🔒 Database connection to {} closed", self.endpoint);
        }
    }
}

fn insert_statement(table: &str) -> String {
    let columns = std::iter::once(TIMESTAMP_COLUMN)
        .chain(REGISTER_COLUMNS.iter().copied())
        .collect::<Vec<_>>();
    let placeholders = vec!["?"; columns.len()].join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders
    )
}
