use chrono::{Local, NaiveDateTime, SubsecRound};

use crate::utils::error::ReadError;

pub const TIMESTAMP_COLUMN: &str = "Date_Time";

// Drive register block, in register order.
pub const REGISTER_COLUMNS: [&str; 10] = [
    "Control_Word",
    "Status_Word",
    "Reference_1",
    "Reference_2",
    "Speed",
    "Torque",
    "Voltage",
    "Current_i",
    "Power",
    "Error_code",
];

pub const REGISTER_COUNT: u16 = REGISTER_COLUMNS.len() as u16;

/// One complete register block with the wall-clock second it was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    timestamp: NaiveDateTime,
    registers: Vec<u16>,
}

impl Reading {
    /// Build a reading, refusing anything but exactly `expected` registers.
    pub fn new(
        timestamp: NaiveDateTime,
        registers: Vec<u16>,
        expected: usize,
    ) -> Result<Self, ReadError> {
        if registers.len() < expected {
            return Err(ReadError::ShortRead {
                got: registers.len(),
                expected,
            });
        }
        if registers.len() > expected {
            return Err(ReadError::Transport(format!(
                "device returned {} registers, requested {}",
                registers.len(),
                expected
            )));
        }

        Ok(Self {
            timestamp: timestamp.trunc_subsecs(0),
            registers,
        })
    }

    /// Stamp freshly read registers with the local time.
    pub fn capture(registers: Vec<u16>, expected: usize) -> Result<Self, ReadError> {
        Self::new(Local::now().naive_local(), registers, expected)
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn registers(&self) -> &[u16] {
        &self.registers
    }

    /// Timestamp as shown to operators and stored in text-typed columns.
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
