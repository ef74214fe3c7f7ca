//! Device-level types.

use std::fmt;

/// Color scheme of an e-paper panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorScheme {
    /// Black and white.
    Mono,
    /// Black, white and red.
    Bwr,
    /// Black, white and yellow.
    Bwy,
    /// Black, white, red and yellow.
    Bwry,
    /// Black, white, green, blue, red and yellow.
    Bwgbry,
    /// Four shades of gray.
    Grayscale4,
}

impl ColorScheme {
    /// Parses a color scheme from its config byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Mono),
            1 => Some(Self::Bwr),
            2 => Some(Self::Bwy),
            3 => Some(Self::Bwry),
            4 => Some(Self::Bwgbry),
            5 => Some(Self::Grayscale4),
            _ => None,
        }
    }

    /// Returns the number of distinct colors the panel can show.
    #[must_use]
    pub const fn palette_size(self) -> usize {
        match self {
            Self::Mono => 2,
            Self::Bwr | Self::Bwy => 3,
            Self::Bwry | Self::Grayscale4 => 4,
            Self::Bwgbry => 6,
        }
    }
}

impl From<ColorScheme> for u8 {
    fn from(scheme: ColorScheme) -> Self {
        match scheme {
            ColorScheme::Mono => 0,
            ColorScheme::Bwr => 1,
            ColorScheme::Bwy => 2,
            ColorScheme::Bwry => 3,
            ColorScheme::Bwgbry => 4,
            ColorScheme::Grayscale4 => 5,
        }
    }
}

/// Dithering algorithm requested from the image encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DitherMode {
    /// Nearest palette color, no error diffusion.
    None,
    /// Floyd-Steinberg error diffusion.
    FloydSteinberg,
    /// Burkes error diffusion.
    #[default]
    Burkes,
    /// Ordered (Bayer) dithering.
    Ordered,
}

/// Refresh mode selector sent with the upload end frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RefreshMode {
    /// Full refresh, clears ghosting.
    #[default]
    Full = 0x00,
    /// Fast refresh.
    Fast = 0x01,
    /// Partial refresh of the changed region.
    Partial = 0x02,
}

impl From<RefreshMode> for u8 {
    fn from(mode: RefreshMode) -> Self {
        mode as Self
    }
}

/// Firmware version reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Git SHA of the firmware build.
    pub sha: String,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} ({})", self.major, self.minor, self.sha)
    }
}
