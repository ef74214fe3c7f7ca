//! Error types for the inkwire library.

use thiserror::Error;

/// The main error type for inkwire operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying link.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport unavailable or lost.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// Connection is not established.
    #[error("not connected")]
    NotConnected,

    /// No response arrived within the bound.
    #[error("timed out after {timeout_ms}ms waiting for a response")]
    Timeout { timeout_ms: u64 },

    /// Malformed or unexpected frame.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// The device echoed a different opcode than the one acknowledged.
    #[error("ack mismatch: expected 0x{expected:04x}, got 0x{actual:04x}")]
    AckMismatch { expected: u16, actual: u16 },

    /// Opcode outside the protocol's opcode space.
    #[error("unknown opcode 0x{0:04x}")]
    UnknownOpcode(u16),

    /// The device reported that the display refresh timed out.
    #[error("device reported a display refresh timeout")]
    RefreshTimeout,

    /// Fixed-size record decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Structurally invalid configuration blob.
    #[error("config parse error: {0}")]
    Config(#[from] ConfigError),

    /// Image could not be encoded for the target display.
    #[error("encoding error: {message}")]
    Encoding { message: String },

    /// A payload exceeded its ceiling.
    #[error("size limit exceeded: {size} bytes exceeds maximum {max}")]
    SizeLimit { size: usize, max: usize },
}

impl Error {
    /// Creates a protocol error from a message.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a timeout error for the given bound.
    #[must_use]
    pub fn timeout(timeout: std::time::Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Returns true if this is a response timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Fixed-size record errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer shorter than the record's fixed size.
    #[error("too short: need {expected} bytes, got {got}")]
    TooShort { expected: usize, got: usize },
}

/// Configuration blob errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A record payload is shorter than its declared size.
    #[error("record type 0x{type_id:02x} truncated: expected {expected} bytes, got {got}")]
    Truncated { type_id: u8, expected: usize, got: usize },

    /// Response too short to contain the wrapper header.
    #[error("config response too short for wrapper: {0} bytes")]
    WrapperTooShort(usize),

    /// More instances of a repeatable record than the device supports.
    #[error("too many {kind} records: {count} (max 4)")]
    TooManyInstances { kind: &'static str, count: usize },
}

/// Result type alias for inkwire operations.
pub type Result<T> = std::result::Result<T, Error>;
