pub mod client;
pub mod crc;
pub mod protocol;

pub use client::{list_serial_ports, ModbusClient};
pub use crc::crc16_modbus;
pub use protocol::ReadHoldingRegisters;
