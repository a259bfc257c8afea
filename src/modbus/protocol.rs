use log::debug;
use std::io::{Read, Write};

use super::crc::{append_crc, crc_matches};
use crate::utils::error::ReadError;

pub const READ_HOLDING_REGISTERS: u8 = 0x03;
const EXCEPTION_FLAG: u8 = 0x80;

/// Function 0x03 request for one contiguous register block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHoldingRegisters {
    pub slave_id: u8,
    pub start: u16,
    pub count: u16,
}

impl ReadHoldingRegisters {
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = vec![self.slave_id, READ_HOLDING_REGISTERS];
        frame.extend_from_slice(&self.start.to_be_bytes());
        frame.extend_from_slice(&self.count.to_be_bytes());
        append_crc(&mut frame);
        frame
    }
}

/// Send one request and read back the register values.
///
/// Blocking; the port's own read timeout bounds the wait.
pub fn exchange<T>(port: &mut T, request: &ReadHoldingRegisters) -> Result<Vec<u16>, ReadError>
where
    T: Read + Write + ?Sized,
{
    let frame = request.encode();
    debug!("📤 Sending frame: {}", hex::encode(&frame));

    port.write_all(&frame)?;
    port.flush()?;

    // slave, function, byte count (or exception code)
    let mut header = [0u8; 3];
    port.read_exact(&mut header)?;

    if header[1] == READ_HOLDING_REGISTERS | EXCEPTION_FLAG {
        let mut crc = [0u8; 2];
        port.read_exact(&mut crc)?;
        let mut response = header.to_vec();
        response.extend_from_slice(&crc);
        debug!("📥 Exception frame: {}", hex::encode(&response));

        if !crc_matches(&response) {
            return Err(ReadError::Transport("CRC checksum mismatch".to_string()));
        }
        return Err(ReadError::Transport(format!(
            "device exception 0x{:02x}",
            header[2]
        )));
    }

    if header[0] != request.slave_id || header[1] != READ_HOLDING_REGISTERS {
        return Err(ReadError::Transport(format!(
            "unexpected response header: slave {} function 0x{:02x}",
            header[0], header[1]
        )));
    }

    let byte_count = header[2] as usize;
    let mut body = vec![0u8; byte_count + 2];
    port.read_exact(&mut body)?;

    let mut response = header.to_vec();
    response.extend_from_slice(&body);
    debug!("📥 Response frame: {}", hex::encode(&response));

    if !crc_matches(&response) {
        return Err(ReadError::Transport("CRC checksum mismatch".to_string()));
    }

    decode_registers(&response[3..3 + byte_count], request.count)
}

/// Split a response payload into big-endian registers.
pub fn decode_registers(data: &[u8], expected: u16) -> Result<Vec<u16>, ReadError> {
    if data.len() % 2 != 0 {
        return Err(ReadError::Transport(format!(
            "odd payload length {}",
            data.len()
        )));
    }

    let got = data.len() / 2;
    let expected = expected as usize;
    if got < expected {
        return Err(ReadError::ShortRead { got, expected });
    }
    if got > expected {
        return Err(ReadError::Transport(format!(
            "device returned {} registers, requested {}",
            got, expected
        )));
    }

    Ok(data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}
