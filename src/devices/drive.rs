use async_trait::async_trait;
use log::{info, warn};

use super::traits::{DeviceConnector, RegisterDevice};
use crate::config::settings::DeviceConfig;
use crate::modbus::ModbusClient;
use crate::storage::models::Reading;
use crate::utils::error::{ConnectError, ReadError};

/// Connects to a drive over Modbus RTU on a local serial port.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

#[async_trait]
impl DeviceConnector for SerialConnector {
    type Device = DriveDevice;

    async fn connect(&self, config: &DeviceConfig) -> Result<DriveDevice, ConnectError> {
        let client = ModbusClient::open(config)?;

        // An open port says nothing about the drive; ask it for one register.
        info!(
            "🔍 Probing device {} at register {}",
            config.slave_id, config.start_address
        );
        if let Err(e) = client.read_holding_registers(config.start_address, 1).await {
            warn!("📵 Device {} did not answer the probe: {}", config.slave_id, e);
            return Err(ConnectError::Device {
                endpoint: config.port.clone(),
                reason: format!("device {} did not respond: {}", config.slave_id, e),
            });
        }

        info!("✅ Modbus connection established on {}", config.port);
        Ok(DriveDevice {
            client: Some(client),
        })
    }
}

pub struct DriveDevice {
    client: Option<ModbusClient>,
}

#[async_trait]
impl RegisterDevice for DriveDevice {
    async fn read_block(&mut self, start_addr: u16, count: u16) -> Result<Reading, ReadError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ReadError::Transport("device handle is closed".to_string()))?;

        let registers = client.read_holding_registers(start_addr, count).await?;
        Reading::capture(registers, count as usize)
    }

    async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            let port_name = client.port_name().to_string();
            drop(client);
            info!("🔒 Modbus connection on {} closed", port_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_device_refuses_reads_and_closes_again_quietly() {
        let mut device = DriveDevice { client: None };

        device.close().await;
        device.close().await;

        let err = device.read_block(0, 10).await.unwrap_err();
        assert_eq!(err, ReadError::Transport("device handle is closed".to_string()));
    }
}
