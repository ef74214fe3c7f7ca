//! Record type table for the configuration TLV stream.
//!
//! Each packet in the stream starts with a record number and a type id.
//! The type id fixes the payload length; there is no explicit length byte.

/// Configuration record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordKind {
    /// MCU and board flags.
    System = 0x01,
    /// Manufacturer and board identity.
    Manufacturer = 0x02,
    /// Power source and battery sensing.
    Power = 0x04,
    /// Display panel.
    Display = 0x20,
    /// Status LED.
    Led = 0x21,
    /// Sensor.
    Sensor = 0x23,
    /// I2C/SPI data bus.
    DataBus = 0x24,
    /// Buttons and other binary inputs.
    BinaryInput = 0x25,
}

impl RecordKind {
    /// All kinds in serialization order.
    pub const ALL: [Self; 8] = [
        Self::System,
        Self::Manufacturer,
        Self::Power,
        Self::Display,
        Self::Led,
        Self::Sensor,
        Self::DataBus,
        Self::BinaryInput,
    ];

    /// Attempts to parse a record kind from its type id.
    #[must_use]
    pub const fn from_type_id(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::System),
            0x02 => Some(Self::Manufacturer),
            0x04 => Some(Self::Power),
            0x20 => Some(Self::Display),
            0x21 => Some(Self::Led),
            0x23 => Some(Self::Sensor),
            0x24 => Some(Self::DataBus),
            0x25 => Some(Self::BinaryInput),
            _ => None,
        }
    }

    /// Returns the fixed payload size in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::System | Self::Manufacturer | Self::Led => 22,
            Self::Power | Self::Sensor | Self::DataBus | Self::BinaryInput => 30,
            Self::Display => 46,
        }
    }

    /// Returns true if the device stores up to four instances of this kind.
    #[must_use]
    pub const fn is_repeatable(self) -> bool {
        !matches!(self, Self::System | Self::Manufacturer | Self::Power)
    }

    /// Returns a human readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Manufacturer => "manufacturer",
            Self::Power => "power",
            Self::Display => "display",
            Self::Led => "led",
            Self::Sensor => "sensor",
            Self::DataBus => "data bus",
            Self::BinaryInput => "binary input",
        }
    }
}

impl From<RecordKind> for u8 {
    fn from(kind: RecordKind) -> Self {
        kind as Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_from_type_id() {
        assert_eq!(RecordKind::from_type_id(0x01), Some(RecordKind::System));
        assert_eq!(RecordKind::from_type_id(0x20), Some(RecordKind::Display));
        assert_eq!(RecordKind::from_type_id(0x22), None);
        assert_eq!(RecordKind::from_type_id(0xFF), None);
    }

    #[test]
    fn test_record_sizes() {
        for kind in RecordKind::ALL {
            assert!((22..=46).contains(&kind.size()), "{kind:?}");
            assert_eq!(RecordKind::from_type_id(kind.into()), Some(kind));
        }
        assert_eq!(RecordKind::Display.size(), 46);
    }

    #[test]
    fn test_is_repeatable() {
        assert!(!RecordKind::System.is_repeatable());
        assert!(!RecordKind::Power.is_repeatable());
        assert!(RecordKind::Led.is_repeatable());
        assert!(RecordKind::BinaryInput.is_repeatable());
    }
}
