pub mod settings;

pub use settings::{
    Config,
    DataBitsConfig,
    DeviceConfig,
    ParityConfig,
    StopBitsConfig,
    StorageConfig,
    StorageDriver,
};
