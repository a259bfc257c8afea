pub mod acquisition;
pub mod status;

pub use acquisition::{run_logger, AcquisitionLoop, LoopState, TickOutcome, TickStats};
pub use status::{Status, StatusDetail, StatusFile, StatusSink};
