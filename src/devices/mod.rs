pub mod drive;
pub mod traits;

pub use drive::{DriveDevice, SerialConnector};
pub use traits::{DeviceConnector, RegisterDevice};
