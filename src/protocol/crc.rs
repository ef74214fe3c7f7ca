//! Configuration checksum.
//!
//! The firmware stores the low 16 bits of a standard CRC-32/ISO-HDLC
//! (poly 0xEDB88320 reflected, init and final XOR 0xFFFFFFFF). This is not
//! any of the CRC-16 variants.

/// Computes the device's 16-bit config checksum.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    (crc32fast::hash(data) & 0xFFFF) as u16
}
