//! Inbound frame interpretation.
//!
//! Responses start with a 2-byte big-endian opcode, usually an echo of the
//! command being answered, with [`ACK_BIT`] set for confirmations.

use crate::error::{Error, Result};
use crate::protocol::command::{ACK_BIT, Opcode};
use crate::types::FirmwareVersion;

/// Reads the big-endian opcode at `offset`.
pub fn read_opcode(frame: &[u8], offset: usize) -> Result<u16> {
    match frame.get(offset..offset + 2) {
        Some(&[hi, lo]) => Ok(u16::from_be_bytes([hi, lo])),
        _ => Err(Error::protocol(format!(
            "frame too short for opcode at offset {offset}: {} bytes",
            frame.len()
        ))),
    }
}

/// A decoded response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response<'a> {
    /// Opcode with the ack bit cleared.
    pub opcode: Opcode,
    /// True if the ack bit was set.
    pub is_ack: bool,
    /// Bytes after the opcode.
    pub payload: &'a [u8],
}

impl<'a> Response<'a> {
    /// Splits a frame into opcode, ack flag and payload.
    ///
    /// Fails on opcodes outside the protocol's opcode space.
    pub fn parse(frame: &'a [u8]) -> Result<Self> {
        let raw = read_opcode(frame, 0)?;
        let opcode = Opcode::from_u16(raw & !ACK_BIT).ok_or(Error::UnknownOpcode(raw))?;
        Ok(Self {
            opcode,
            is_ack: raw & ACK_BIT != 0,
            payload: &frame[2..],
        })
    }

    /// Returns the raw 16-bit opcode as received.
    #[must_use]
    pub fn raw_opcode(&self) -> u16 {
        if self.is_ack {
            self.opcode.ack()
        } else {
            self.opcode.into()
        }
    }
}

fn matches_expected(actual: u16, expected: Opcode) -> bool {
    actual == u16::from(expected) || actual == expected.ack()
}

/// Drops a leading echo of `expected` (with or without the ack bit).
///
/// Frames that don't start with the echo are returned unchanged.
#[must_use]
pub fn strip_echo(frame: &[u8], expected: Opcode) -> &[u8] {
    match read_opcode(frame, 0) {
        Ok(op) if matches_expected(op, expected) => &frame[2..],
        _ => frame,
    }
}

/// Checks that a frame acknowledges `expected`.
pub fn validate_ack(frame: &[u8], expected: Opcode) -> Result<()> {
    let actual = read_opcode(frame, 0)?;
    if matches_expected(actual, expected) {
        Ok(())
    } else {
        Err(Error::AckMismatch {
            expected: expected.into(),
            actual,
        })
    }
}

/// Parses a firmware version response.
///
/// Format:
/// ```text
/// [echo:2] [major:1] [minor:1] [sha_len:1] [sha:sha_len ASCII]
/// ```
pub fn parse_firmware_version(frame: &[u8]) -> Result<FirmwareVersion> {
    if frame.len() < 5 {
        return Err(Error::protocol(format!(
            "firmware version response too short: {} bytes",
            frame.len()
        )));
    }

    let major = frame[2];
    let minor = frame[3];
    let sha_len = usize::from(frame[4]);

    if sha_len == 0 {
        return Err(Error::protocol("firmware version response has empty SHA"));
    }
    let Some(sha_bytes) = frame.get(5..5 + sha_len) else {
        return Err(Error::protocol(format!(
            "firmware version response truncated: SHA declares {sha_len} bytes, got {}",
            frame.len() - 5
        )));
    };

    Ok(FirmwareVersion {
        major,
        minor,
        sha: String::from_utf8_lossy(sha_bytes).into_owned(),
    })
}
