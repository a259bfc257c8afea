use futures_util::FutureExt;
use log::{debug, error, info, warn};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::devices::{DeviceConnector, RegisterDevice};
use crate::services::status::{Status, StatusSink};
use crate::storage::models::REGISTER_COUNT;
use crate::storage::{ReadingStore, StorageConnector};
use crate::utils::error::LoggerError;

/// Consecutive failed inserts between reminders that the session may be gone.
pub const INSERT_FAILURE_REMINDER: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    Initializing,
    Ready,
    Cycling,
    Degraded(String),
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Persisted,
    ReadFailed,
    InsertFailed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    pub persisted: u64,
    pub read_failures: u64,
    pub insert_failures: u64,
    consecutive_insert_failures: u32,
}

/// Load the configuration, connect both endpoints and cycle until `cancel` fires.
///
/// Every failure is published to `status` before it is returned.
pub async fn run_logger<DC, SC, P>(
    config_path: &Path,
    device_connector: &DC,
    storage_connector: &SC,
    status: P,
    cancel: CancellationToken,
) -> Result<TickStats, LoggerError>
where
    DC: DeviceConnector,
    SC: StorageConnector,
    P: StatusSink,
{
    let config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Config error: {}", e);
            status
                .publish(&Status::error(false, format!("Cannot read config: {}", e)))
                .await;
            return Err(e.into());
        }
    };

    let acquisition =
        AcquisitionLoop::initialize(&config, device_connector, storage_connector, status).await?;
    acquisition.run(cancel).await
}

/// The read, persist, report cycle. Owns the device handle and the storage session.
pub struct AcquisitionLoop<D, S, P> {
    device: D,
    store: S,
    status: P,
    start_address: u16,
    interval: Duration,
    state: LoopState,
    stats: TickStats,
}

impl<D, S, P> AcquisitionLoop<D, S, P>
where
    D: RegisterDevice,
    S: ReadingStore,
    P: StatusSink,
{
    /// Connect the device, then storage. Either failure is fatal; nothing is retried.
    pub async fn initialize<DC, SC>(
        config: &Config,
        device_connector: &DC,
        storage_connector: &SC,
        status: P,
    ) -> Result<Self, LoggerError>
    where
        DC: DeviceConnector<Device = D>,
        SC: StorageConnector<Store = S>,
    {
        info!("🚀 Initializing logger: {:?}", LoopState::Initializing);

        let mut device = match device_connector.connect(&config.device).await {
            Ok(device) => device,
            Err(e) => {
                error!("❌ {}", e);
                status.publish(&Status::error(false, e.to_string())).await;
                return Err(e.into());
            }
        };

        let store = match storage_connector.connect(&config.storage).await {
            Ok(store) => store,
            Err(e) => {
                error!("❌ {}", e);
                status.publish(&Status::error(false, e.to_string())).await;
                device.close().await;
                return Err(e.into());
            }
        };

        info!(
            "✅ Both endpoints connected, sampling every {} s",
            config.interval_seconds
        );
        Ok(Self {
            device,
            store,
            status,
            start_address: config.device.start_address,
            interval: config.interval(),
            state: LoopState::Ready,
            stats: TickStats::default(),
        })
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    /// Cycle until cancelled or a tick faults, then publish the final status and
    /// release storage and device, in that order, on every path.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<TickStats, LoggerError> {
        self.status.publish(&Status::started()).await;
        self.transition(LoopState::Cycling);
        info!("🔄 Logger started");

        let mut schedule = TickSchedule::new(self.interval);

        let result = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                _ = sleep_until(schedule.deadline()) => {}
            }

            match AssertUnwindSafe(self.tick()).catch_unwind().await {
                Ok(outcome) => debug!("Tick {} finished: {:?}", self.stats.ticks, outcome),
                Err(panic) => break Err(panic_message(panic)),
            }
            schedule.advance(Instant::now());
        };

        match &result {
            Ok(()) => {
                info!("🛑 Logger stopped");
                self.status.publish(&Status::stopped()).await;
            }
            Err(reason) => {
                error!("💥 Unexpected error: {}", reason);
                self.status
                    .publish(&Status::error(false, format!("Unexpected error: {}", reason)))
                    .await;
            }
        }

        self.store.close().await;
        self.device.close().await;
        self.transition(LoopState::Stopped);

        info!("📊 Final Statistics:");
        info!("   🔁 Ticks: {}", self.stats.ticks);
        info!("   💾 Persisted: {}", self.stats.persisted);
        info!("   📵 Read failures: {}", self.stats.read_failures);
        info!("   ❌ Insert failures: {}", self.stats.insert_failures);

        result.map(|()| self.stats).map_err(LoggerError::Fault)
    }

    async fn tick(&mut self) -> TickOutcome {
        self.stats.ticks += 1;

        let reading = match self.device.read_block(self.start_address, REGISTER_COUNT).await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("⚠️  {}", e);
                self.stats.read_failures += 1;
                self.status.publish(&Status::warning(true, e.to_string())).await;
                self.transition(LoopState::Degraded(e.to_string()));
                return TickOutcome::ReadFailed;
            }
        };

        // One attempt per tick; a failed row is dropped, the next tick reads afresh.
        match self.store.insert_reading(&reading).await {
            Ok(_) => {
                let ts = reading.formatted_timestamp();
                info!("💾 Data logged successfully at {}", ts);
                self.stats.persisted += 1;
                self.stats.consecutive_insert_failures = 0;
                self.status.publish(&Status::last_update(&ts)).await;
                self.transition(LoopState::Cycling);
                TickOutcome::Persisted
            }
            Err(e) => {
                error!("❌ Database insert error: {}", e);
                self.stats.insert_failures += 1;
                self.stats.consecutive_insert_failures += 1;
                if self.stats.consecutive_insert_failures % INSERT_FAILURE_REMINDER == 0 {
                    warn!(
                        "⚠️  {} consecutive inserts failed; the database session may be gone, restart the logger to reconnect",
                        self.stats.consecutive_insert_failures
                    );
                }
                let message = format!("Database insert error: {}", e);
                self.status.publish(&Status::error(true, message.clone())).await;
                self.transition(LoopState::Degraded(message));
                TickOutcome::InsertFailed
            }
        }
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            info!("🔁 State {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

/// Tick deadlines on the `start + k * period` grid. A tick that overruns its slot
/// skips the missed slots instead of firing late.
struct TickSchedule {
    period: Duration,
    next: Instant,
}

impl TickSchedule {
    fn new(period: Duration) -> Self {
        Self {
            period,
            next: Instant::now(),
        }
    }

    fn deadline(&self) -> Instant {
        self.next
    }

    /// Move to the next slot. Slots that began before `now` are skipped; a slot
    /// starting exactly at `now` is still taken.
    fn advance(&mut self, now: Instant) {
        self.next += self.period;
        while self.next < now {
            self.next += self.period;
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "acquisition task panicked".to_string()
    }
}
