//! Hardware description records stored in the device configuration.
//!
//! Every record has a fixed wire size. Reserved regions are kept as opaque
//! byte arrays so that fields assigned by newer firmware survive a
//! read-modify-write cycle.

use crate::types::device::ColorScheme;

/// Communication mode bits of [`SystemConfig::communication_modes`].
pub mod comm_mode {
    /// Bluetooth Low Energy.
    pub const BLE: u8 = 0x01;
    /// `OpenEPaperLink` access point protocol.
    pub const OEPL: u8 = 0x02;
    /// Wi-Fi.
    pub const WIFI: u8 = 0x04;
}

/// Device flag bits of [`SystemConfig::device_flags`].
pub mod device_flag {
    /// A power-enable pin is wired (see [`super::SystemConfig::pwr_pin`]).
    pub const PWR_PIN: u8 = 0x01;
    /// Board needs the XIAO-style initialization sequence.
    pub const XIAO_INIT: u8 = 0x02;
}

/// Transmission mode bits of [`DisplayConfig::transmission_modes`].
pub mod transmission_mode {
    /// Uncompressed image data.
    pub const RAW: u8 = 0x01;
    /// zlib-compressed image data.
    pub const ZIP: u8 = 0x02;
    /// Group 5 compressed image data.
    pub const G5: u8 = 0x04;
    /// Streamed straight into the panel's frame buffer.
    pub const DIRECT_WRITE: u8 = 0x08;
}

/// System record (type 0x01, 22 bytes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemConfig {
    /// MCU type.
    pub ic_type: u16,
    /// Bitmask of [`comm_mode`] values.
    pub communication_modes: u8,
    /// Bitmask of [`device_flag`] values.
    pub device_flags: u8,
    /// Power-enable pin, only meaningful when [`Self::has_pwr_pin`] is true.
    pub pwr_pin: u8,
    /// Reserved for future firmware.
    pub reserved: [u8; 17],
}

impl SystemConfig {
    /// Returns true if the board wires a power-enable pin.
    #[must_use]
    pub const fn has_pwr_pin(&self) -> bool {
        self.device_flags & device_flag::PWR_PIN != 0
    }

    /// Returns true if the board uses the XIAO initialization sequence.
    #[must_use]
    pub const fn needs_xiao_init(&self) -> bool {
        self.device_flags & device_flag::XIAO_INIT != 0
    }

    /// Returns true if BLE is an enabled communication mode.
    #[must_use]
    pub const fn supports_ble(&self) -> bool {
        self.communication_modes & comm_mode::BLE != 0
    }
}

/// Manufacturer record (type 0x02, 22 bytes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManufacturerData {
    /// Manufacturer identifier.
    pub manufacturer_id: u16,
    /// Board type within the manufacturer's range.
    pub board_type: u8,
    /// Board revision.
    pub board_revision: u8,
    /// Reserved for future firmware.
    pub reserved: [u8; 18],
}

/// Power source of the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    /// Battery powered.
    Battery,
    /// USB powered.
    Usb,
    /// Solar powered.
    Solar,
    /// Unrecognized value.
    Unknown(u8),
}

impl PowerMode {
    /// Parses a power mode byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Battery,
            1 => Self::Usb,
            2 => Self::Solar,
            other => Self::Unknown(other),
        }
    }
}

/// Power record (type 0x04, 30 bytes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PowerOption {
    /// Raw power mode, see [`Self::mode`].
    pub power_mode: u8,
    /// Battery capacity in mAh. Stored as 24 bits on the wire.
    pub battery_capacity_mah: u32,
    /// Idle time before sleeping.
    pub sleep_timeout_ms: u16,
    /// Radio TX power.
    pub tx_power: u8,
    pub sleep_flags: u8,
    pub battery_sense_pin: u8,
    pub battery_sense_enable_pin: u8,
    pub battery_sense_flags: u8,
    pub capacity_estimator: u8,
    pub voltage_scaling_factor: u16,
    /// Deep-sleep current in microamps.
    pub deep_sleep_current_ua: u32,
    pub deep_sleep_time_seconds: u16,
    /// Reserved for future firmware.
    pub reserved: [u8; 10],
}

impl PowerOption {
    /// Largest capacity representable in the 24-bit wire field.
    pub const MAX_BATTERY_CAPACITY_MAH: u32 = 0x00FF_FFFF;

    /// Returns the decoded power mode.
    #[must_use]
    pub const fn mode(&self) -> PowerMode {
        PowerMode::from_byte(self.power_mode)
    }
}

/// Display record (type 0x20, 46 bytes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayConfig {
    pub instance_number: u8,
    pub display_technology: u8,
    /// Panel controller IC.
    pub panel_ic_type: u16,
    pub pixel_width: u16,
    pub pixel_height: u16,
    pub active_width_mm: u16,
    pub active_height_mm: u16,
    pub legacy_tagtype: u16,
    /// Rotation in 90 degree steps.
    pub rotation: u8,
    pub reset_pin: u8,
    pub busy_pin: u8,
    pub dc_pin: u8,
    pub cs_pin: u8,
    pub data_pin: u8,
    pub partial_update_support: u8,
    /// Raw color scheme, see [`Self::color_scheme`].
    pub color_scheme: u8,
    /// Bitmask of [`transmission_mode`] values.
    pub transmission_modes: u8,
    pub clk_pin: u8,
    /// Pins reserved for future panel interfaces.
    pub reserved_pins: [u8; 7],
    /// Charge of a full refresh in millicoulombs.
    pub full_update_mc: u16,
    /// Reserved for future firmware.
    pub reserved: [u8; 13],
}

impl DisplayConfig {
    /// Returns the color scheme, or `None` for a value this library does not know.
    #[must_use]
    pub const fn color_scheme(&self) -> Option<ColorScheme> {
        ColorScheme::from_byte(self.color_scheme)
    }

    /// Returns true if the panel supports partial refresh.
    #[must_use]
    pub const fn supports_partial_update(&self) -> bool {
        self.partial_update_support != 0
    }

    /// Returns true if the device accepts zlib-compressed uploads.
    #[must_use]
    pub const fn supports_zip(&self) -> bool {
        self.transmission_modes & transmission_mode::ZIP != 0
    }

    /// Returns true if the device accepts direct-write uploads.
    #[must_use]
    pub const fn supports_direct_write(&self) -> bool {
        self.transmission_modes & transmission_mode::DIRECT_WRITE != 0
    }
}

/// LED record (type 0x21, 22 bytes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedConfig {
    pub instance_number: u8,
    pub led_type: u8,
    pub led_1_r: u8,
    pub led_2_g: u8,
    pub led_3_b: u8,
    pub led_4: u8,
    pub led_flags: u8,
    /// Reserved for future firmware.
    pub reserved: [u8; 15],
}

/// Sensor record (type 0x23, 30 bytes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorData {
    pub instance_number: u8,
    pub sensor_type: u16,
    /// Index of the [`DataBus`] the sensor hangs off.
    pub bus_id: u8,
    /// Reserved for future firmware.
    pub reserved: [u8; 26],
}

/// Data bus record (type 0x24, 30 bytes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataBus {
    pub instance_number: u8,
    pub bus_type: u8,
    pub pin_1: u8,
    pub pin_2: u8,
    pub pin_3: u8,
    pub pin_4: u8,
    pub pin_5: u8,
    pub pin_6: u8,
    pub pin_7: u8,
    pub bus_speed_hz: u32,
    pub bus_flags: u8,
    /// Bitmask of pins with pull-ups enabled.
    pub pullups: u8,
    /// Bitmask of pins with pull-downs enabled.
    pub pulldowns: u8,
    /// Reserved for future firmware.
    pub reserved: [u8; 14],
}

/// Binary input record (type 0x25, 30 bytes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryInputs {
    pub instance_number: u8,
    pub input_type: u8,
    pub display_as: u8,
    /// Input pins.
    pub reserved_pins: [u8; 8],
    pub input_flags: u8,
    /// Bitmask of inverted inputs.
    pub invert: u8,
    pub pullups: u8,
    pub pulldowns: u8,
    /// Reserved for future firmware.
    pub reserved: [u8; 15],
}
