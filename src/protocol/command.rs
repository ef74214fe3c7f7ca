//! Opcodes and outbound command frames.
//!
//! Every frame starts with a big-endian 16-bit opcode followed by an
//! opcode-specific payload. Responses reuse the same opcode space; the
//! high bit ([`ACK_BIT`]) marks an acknowledgement.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::types::RefreshMode;

/// Acknowledgement flag layered over the opcode space.
pub const ACK_BIT: u16 = 0x8000;

/// Largest config payload sent in a single frame.
pub const CONFIG_CHUNK_SIZE: usize = 200;

/// Config bytes carried by the first frame of a multi-chunk write.
pub const CONFIG_FIRST_CHUNK_SIZE: usize = CONFIG_CHUNK_SIZE - 2;

/// Largest config frame, opcode included.
pub const MAX_CONFIG_FRAME_SIZE: usize = 2 + CONFIG_CHUNK_SIZE;

/// Largest upload start frame, opcode included.
pub const MAX_START_FRAME_SIZE: usize = 200;

/// Largest image payload of one upload data frame.
pub const UPLOAD_CHUNK_SIZE: usize = 230;

/// Largest compressed image the device can buffer.
pub const MAX_COMPRESSED_SIZE: usize = 50 * 1024;

/// Protocol opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    /// Reboot the device.
    Reboot = 0x000F,
    /// Read the stored configuration.
    ReadConfig = 0x0040,
    /// Write a configuration (single frame or first chunk).
    WriteConfig = 0x0041,
    /// Continuation chunk of a configuration write.
    WriteConfigChunk = 0x0042,
    /// Read firmware version.
    ReadFirmwareVersion = 0x0043,
    /// Begin an image upload.
    UploadStart = 0x0070,
    /// Image data chunk.
    UploadData = 0x0071,
    /// End an image upload and trigger a refresh.
    UploadEnd = 0x0072,
    /// Display refresh finished.
    RefreshComplete = 0x0073,
    /// Display refresh timed out on the device.
    RefreshTimeout = 0x0074,
}

impl Opcode {
    /// Attempts to parse an opcode from its 16-bit value (ack bit cleared).
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x000F => Some(Self::Reboot),
            0x0040 => Some(Self::ReadConfig),
            0x0041 => Some(Self::WriteConfig),
            0x0042 => Some(Self::WriteConfigChunk),
            0x0043 => Some(Self::ReadFirmwareVersion),
            0x0070 => Some(Self::UploadStart),
            0x0071 => Some(Self::UploadData),
            0x0072 => Some(Self::UploadEnd),
            0x0073 => Some(Self::RefreshComplete),
            0x0074 => Some(Self::RefreshTimeout),
            _ => None,
        }
    }

    /// Returns the acknowledgement form of this opcode.
    #[must_use]
    pub const fn ack(self) -> u16 {
        self as u16 | ACK_BIT
    }

    /// Returns the big-endian wire bytes.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 2] {
        (self as u16).to_be_bytes()
    }
}

impl From<Opcode> for u16 {
    fn from(op: Opcode) -> Self {
        op as Self
    }
}

fn frame(op: Opcode, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + payload.len());
    buf.put_u16(op.into());
    buf.put_slice(payload);
    buf.freeze()
}

/// Builds a read-config request.
#[must_use]
pub fn read_config() -> Bytes {
    frame(Opcode::ReadConfig, &[])
}

/// Builds a read-firmware-version request.
#[must_use]
pub fn read_firmware_version() -> Bytes {
    frame(Opcode::ReadFirmwareVersion, &[])
}

/// Builds a reboot request.
#[must_use]
pub fn reboot() -> Bytes {
    frame(Opcode::Reboot, &[])
}

/// A config write split into frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteConfigCommand {
    /// First frame, opcode included.
    pub first: Bytes,
    /// Raw config slices that follow, without opcode.
    pub continuations: Vec<Bytes>,
}

impl WriteConfigCommand {
    /// Returns every wire frame in send order.
    pub fn frames(&self) -> impl Iterator<Item = Bytes> + '_ {
        std::iter::once(self.first.clone())
            .chain(self.continuations.iter().map(|c| write_config_chunk(c)))
    }

    /// Returns the number of frames.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        1 + self.continuations.len()
    }
}

/// Builds the frames of a config write.
///
/// Data up to [`CONFIG_CHUNK_SIZE`] bytes goes in one frame. Longer data
/// starts with a frame carrying the 2-byte little-endian total length and
/// the first [`CONFIG_FIRST_CHUNK_SIZE`] bytes, followed by raw slices of at
/// most [`CONFIG_CHUNK_SIZE`] bytes.
pub fn write_config(data: &[u8]) -> Result<WriteConfigCommand> {
    if data.len() <= CONFIG_CHUNK_SIZE {
        return Ok(WriteConfigCommand {
            first: frame(Opcode::WriteConfig, data),
            continuations: Vec::new(),
        });
    }

    let total = u16::try_from(data.len()).map_err(|_| Error::SizeLimit {
        size: data.len(),
        max: usize::from(u16::MAX),
    })?;

    let (head, tail) = data.split_at(CONFIG_FIRST_CHUNK_SIZE);
    let mut buf = BytesMut::with_capacity(MAX_CONFIG_FRAME_SIZE);
    buf.put_u16(Opcode::WriteConfig.into());
    buf.put_u16_le(total);
    buf.put_slice(head);

    Ok(WriteConfigCommand {
        first: buf.freeze(),
        continuations: tail
            .chunks(CONFIG_CHUNK_SIZE)
            .map(Bytes::copy_from_slice)
            .collect(),
    })
}

/// Builds a config continuation frame.
#[must_use]
pub fn write_config_chunk(slice: &[u8]) -> Bytes {
    frame(Opcode::WriteConfigChunk, slice)
}

/// Builds a compressed upload start frame.
///
/// Carries the uncompressed size followed by as much of the compressed
/// stream as fits in [`MAX_START_FRAME_SIZE`]. Returns the frame and the
/// number of compressed bytes it consumed.
#[must_use]
pub fn upload_start_compressed(original_size: u32, compressed: &[u8]) -> (Bytes, usize) {
    let room = MAX_START_FRAME_SIZE - 2 - 4;
    let take = compressed.len().min(room);

    let mut buf = BytesMut::with_capacity(2 + 4 + take);
    buf.put_u16(Opcode::UploadStart.into());
    buf.put_u32_le(original_size);
    buf.put_slice(&compressed[..take]);
    (buf.freeze(), take)
}

/// Builds an uncompressed upload start frame.
#[must_use]
pub fn upload_start_uncompressed() -> Bytes {
    frame(Opcode::UploadStart, &[])
}

/// Builds an upload data frame.
pub fn upload_data(chunk: &[u8]) -> Result<Bytes> {
    if chunk.len() > UPLOAD_CHUNK_SIZE {
        return Err(Error::SizeLimit {
            size: chunk.len(),
            max: UPLOAD_CHUNK_SIZE,
        });
    }
    Ok(frame(Opcode::UploadData, chunk))
}

/// Builds an upload end frame.
#[must_use]
pub fn upload_end(mode: RefreshMode) -> Bytes {
    frame(Opcode::UploadEnd, &[mode.into()])
}
