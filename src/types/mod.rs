//! Data types for e-paper tag entities.
//!
//! This module contains the core data structures used throughout the library:
//! - Hardware description records
//! - The aggregate device configuration
//! - Device-level enums and firmware information

pub mod config;
pub mod device;
pub mod records;

pub use config::GlobalConfig;
pub use device::{ColorScheme, DitherMode, FirmwareVersion, RefreshMode};
pub use records::{
    BinaryInputs, DataBus, DisplayConfig, LedConfig, ManufacturerData, PowerMode, PowerOption,
    SensorData, SystemConfig,
};
