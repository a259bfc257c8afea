//! Test doubles for the device, storage and status seams.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration, Instant};

use crate::config::{Config, DeviceConfig, StorageConfig};
use crate::devices::{DeviceConnector, RegisterDevice};
use crate::services::status::{Status, StatusSink};
use crate::storage::models::Reading;
use crate::storage::{ReadingStore, StorageConnector};
use crate::utils::error::{ConnectError, InsertError, ReadError};

/// Dashboard-style document with a one second interval.
pub const TEST_CONFIG_JSON: &str = r#"{
    "modbus": {
        "port": "/dev/ttyTEST0",
        "baudrate": 9600,
        "stopbits": 1,
        "parity": "N",
        "bytesize": 8
    },
    "mysql": {
        "host": "localhost",
        "user": "logger",
        "password": "secret",
        "database": "plant"
    },
    "interval": 1
}"#;

pub fn test_config(interval_seconds: u64) -> Config {
    let mut config = Config::from_json_str(TEST_CONFIG_JSON).expect("test config is valid");
    config.interval_seconds = interval_seconds;
    config
}

/// What the next device read returns. Unscripted reads answer with 100..=1000.
#[derive(Debug, Clone)]
pub enum ScriptedRead {
    Registers(Vec<u16>),
    Transport,
    Panic,
}

#[derive(Default)]
struct MockState {
    journal: Vec<&'static str>,
    reads: VecDeque<ScriptedRead>,
    read_times: Vec<Instant>,
    rows: Vec<Reading>,
    statuses: Vec<Status>,
    failing_inserts: u32,
}

/// Shared recorder behind every mock; also the status sink.
#[derive(Default)]
pub struct Mock {
    state: Mutex<MockState>,
}

impl Mock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn script_reads(&self, reads: impl IntoIterator<Item = ScriptedRead>) {
        self.with(|s| s.reads.extend(reads));
    }

    /// Reject the next `n` inserts.
    pub fn fail_inserts(&self, n: u32) {
        self.with(|s| s.failing_inserts = n);
    }

    pub fn journal(&self) -> Vec<&'static str> {
        self.with(|s| s.journal.clone())
    }

    pub fn count(&self, event: &str) -> usize {
        self.with(|s| s.journal.iter().filter(|e| **e == event).count())
    }

    pub fn rows(&self) -> Vec<Reading> {
        self.with(|s| s.rows.clone())
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.with(|s| s.statuses.clone())
    }

    pub fn read_times(&self) -> Vec<Instant> {
        self.with(|s| s.read_times.clone())
    }

    fn record(&self, event: &'static str) {
        self.with(|s| s.journal.push(event));
    }
}

#[async_trait]
impl StatusSink for Mock {
    async fn publish(&self, status: &Status) {
        self.with(|s| s.statuses.push(status.clone()));
    }
}

pub struct MockDeviceConnector {
    mock: Arc<Mock>,
    failing: bool,
}

impl MockDeviceConnector {
    pub fn new(mock: &Arc<Mock>) -> Self {
        Self {
            mock: Arc::clone(mock),
            failing: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

#[async_trait]
impl DeviceConnector for MockDeviceConnector {
    type Device = MockDevice;

    async fn connect(&self, config: &DeviceConfig) -> Result<MockDevice, ConnectError> {
        self.mock.record("device.connect");
        if self.failing {
            return Err(ConnectError::Device {
                endpoint: config.port.clone(),
                reason: "no such port".to_string(),
            });
        }
        Ok(MockDevice {
            mock: Arc::clone(&self.mock),
            open: true,
        })
    }
}

pub struct MockDevice {
    mock: Arc<Mock>,
    open: bool,
}

#[async_trait]
impl RegisterDevice for MockDevice {
    async fn read_block(&mut self, _start_addr: u16, count: u16) -> Result<Reading, ReadError> {
        // Lock released before any panic so the mock stays usable afterwards.
        let scripted = self.mock.with(|s| {
            s.journal.push("read");
            s.read_times.push(Instant::now());
            s.reads.pop_front()
        });

        let registers = match scripted {
            None => (1..=count).map(|v| v * 100).collect(),
            Some(ScriptedRead::Registers(registers)) => registers,
            Some(ScriptedRead::Transport) => {
                return Err(ReadError::Transport("no response".to_string()))
            }
            Some(ScriptedRead::Panic) => panic!("driver bug: register map out of range"),
        };
        Reading::capture(registers, count as usize)
    }

    async fn close(&mut self) {
        if std::mem::take(&mut self.open) {
            self.mock.record("device.close");
        }
    }
}

pub struct MockStorageConnector {
    mock: Arc<Mock>,
    failing: bool,
    insert_delay: Duration,
}

impl MockStorageConnector {
    pub fn new(mock: &Arc<Mock>) -> Self {
        Self {
            mock: Arc::clone(mock),
            failing: false,
            insert_delay: Duration::ZERO,
        }
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = delay;
        self
    }
}

#[async_trait]
impl StorageConnector for MockStorageConnector {
    type Store = MockStore;

    async fn connect(&self, config: &StorageConfig) -> Result<MockStore, ConnectError> {
        self.mock.record("storage.connect");
        if self.failing {
            return Err(ConnectError::Storage {
                endpoint: config.endpoint(),
                reason: "access denied".to_string(),
            });
        }
        Ok(MockStore {
            mock: Arc::clone(&self.mock),
            insert_delay: self.insert_delay,
            open: true,
        })
    }
}

pub struct MockStore {
    mock: Arc<Mock>,
    insert_delay: Duration,
    open: bool,
}

#[async_trait]
impl ReadingStore for MockStore {
    async fn insert_reading(&mut self, reading: &Reading) -> Result<u64, InsertError> {
        self.mock.record("insert");
        if !self.insert_delay.is_zero() {
            sleep(self.insert_delay).await;
        }

        self.mock.with(|s| {
            if s.failing_inserts > 0 {
                s.failing_inserts -= 1;
                return Err(InsertError::Rejected("duplicate entry".to_string()));
            }
            s.rows.push(reading.clone());
            Ok(1)
        })
    }

    async fn close(&mut self) {
        if std::mem::take(&mut self.open) {
            self.mock.record("storage.close");
        }
    }
}
