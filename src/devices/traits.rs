use async_trait::async_trait;

use crate::config::settings::DeviceConfig;
use crate::storage::models::Reading;
use crate::utils::error::{ConnectError, ReadError};

/// Opens the field device transport.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    type Device: RegisterDevice;

    async fn connect(&self, config: &DeviceConfig) -> Result<Self::Device, ConnectError>;
}

/// An open device handle, exclusively owned by the acquisition loop.
#[async_trait]
pub trait RegisterDevice: Send {
    /// One block read. Short reads and transport failures are ordinary results.
    async fn read_block(&mut self, start_addr: u16, count: u16) -> Result<Reading, ReadError>;

    /// Release the transport. Idempotent and infallible.
    async fn close(&mut self);
}
