//! Aggregate device configuration.

use crate::error::ConfigError;
use crate::types::records::{
    BinaryInputs, DataBus, DisplayConfig, LedConfig, ManufacturerData, PowerOption, SensorData,
    SystemConfig,
};

/// Maximum instances of each repeatable record kind.
pub const MAX_INSTANCES: usize = 4;

/// All configuration records known for one device.
///
/// Single-instance records are optional: a device that never stored one
/// reports none. Repeatable records are ordered by their record number.
#[derive(Debug, Clone, Default)]
pub struct GlobalConfig {
    /// Config format version.
    pub version: u8,
    /// True when the value was parsed from a device response.
    pub loaded: bool,
    pub system: Option<SystemConfig>,
    pub manufacturer: Option<ManufacturerData>,
    pub power: Option<PowerOption>,
    pub displays: Vec<DisplayConfig>,
    pub leds: Vec<LedConfig>,
    pub sensors: Vec<SensorData>,
    pub data_buses: Vec<DataBus>,
    pub binary_inputs: Vec<BinaryInputs>,
}

impl GlobalConfig {
    /// Creates an empty configuration for the given format version.
    #[must_use]
    pub fn new(version: u8) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Returns the first display, which is the one images are uploaded to.
    #[must_use]
    pub fn primary_display(&self) -> Option<&DisplayConfig> {
        self.displays.first()
    }

    /// Checks the per-kind instance ceilings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("display", self.displays.len()),
            ("led", self.leds.len()),
            ("sensor", self.sensors.len()),
            ("data bus", self.data_buses.len()),
            ("binary input", self.binary_inputs.len()),
        ];
        for (kind, count) in counts {
            if count > MAX_INSTANCES {
                return Err(ConfigError::TooManyInstances { kind, count });
            }
        }
        Ok(())
    }
}

// Equality ignores `loaded`.
impl PartialEq for GlobalConfig {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.system == other.system
            && self.manufacturer == other.manufacturer
            && self.power == other.power
            && self.displays == other.displays
            && self.leds == other.leds
            && self.sensors == other.sensors
            && self.data_buses == other.data_buses
            && self.binary_inputs == other.binary_inputs
    }
}

impl Eq for GlobalConfig {}
