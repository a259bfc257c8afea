use log::{error, info};
use serialport::{ClearBuffer, SerialPort};
use std::sync::{Arc, Mutex};

use super::protocol::{exchange, ReadHoldingRegisters};
use crate::config::settings::{DataBitsConfig, DeviceConfig, ParityConfig, StopBitsConfig};
use crate::utils::error::{ConnectError, ReadError};

/// Owner of one open RTU serial line.
pub struct ModbusClient {
    port: Arc<Mutex<Box<dyn SerialPort>>>,
    port_name: String,
    slave_id: u8,
}

impl ModbusClient {
    pub fn open(config: &DeviceConfig) -> Result<Self, ConnectError> {
        info!("🔌 Connecting to Modbus RTU port: {}", config.port);
        info!(
            "⚙️  Configuration: {} baud, {:?} data bits, {:?} parity, {:?} stop bit(s)",
            config.baud_rate, config.data_bits, config.parity, config.stop_bits
        );

        let parity = match config.parity {
            ParityConfig::None => serialport::Parity::None,
            ParityConfig::Even => serialport::Parity::Even,
            ParityConfig::Odd => serialport::Parity::Odd,
        };
        let stop_bits = match config.stop_bits {
            StopBitsConfig::One => serialport::StopBits::One,
            StopBitsConfig::Two => serialport::StopBits::Two,
        };
        let data_bits = match config.data_bits {
            DataBitsConfig::Seven => serialport::DataBits::Seven,
            DataBitsConfig::Eight => serialport::DataBits::Eight,
        };

        let port = serialport::new(config.port.as_str(), config.baud_rate)
            .timeout(config.timeout())
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .open()
            .map_err(|e| {
                error!("❌ Failed to open serial port {}: {}", config.port, e);
                ConnectError::Device {
                    endpoint: config.port.clone(),
                    reason: format!("failed to open port: {}", e),
                }
            })?;

        Ok(Self {
            port: Arc::new(Mutex::new(port)),
            port_name: config.port.clone(),
            slave_id: config.slave_id,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Read `count` holding registers starting at `start_addr`.
    ///
    /// The serial exchange is blocking, so it runs on the blocking pool.
    pub async fn read_holding_registers(
        &self,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<u16>, ReadError> {
        let request = ReadHoldingRegisters {
            slave_id: self.slave_id,
            start: start_addr,
            count,
        };
        let port = Arc::clone(&self.port);

        tokio::task::spawn_blocking(move || {
            let mut port = port
                .lock()
                .map_err(|_| ReadError::Transport("serial port lock poisoned".to_string()))?;

            // Drop stale bytes from an earlier timed-out exchange.
            port.clear(ClearBuffer::Input)
                .map_err(|e| ReadError::Transport(format!("failed to clear input buffer: {}", e)))?;

            exchange(&mut **port, &request)
        })
        .await
        .map_err(|e| ReadError::Transport(format!("serial worker failed: {}", e)))?
    }
}

/// Enumerate serial ports for operators picking a `device.port` value.
pub fn list_serial_ports() -> Result<Vec<String>, serialport::Error> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|port| match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => match usb.manufacturer {
                Some(manufacturer) => format!("{} ({})", port.port_name, manufacturer),
                None => port.port_name,
            },
            _ => port.port_name,
        })
        .collect())
}
