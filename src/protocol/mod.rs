//! Protocol definitions for e-paper tag communication.
//!
//! This module contains the low-level protocol types including:
//! - Opcodes and command frame builders
//! - Response interpretation
//! - Configuration record codecs and the TLV stream
//! - The config checksum

pub mod command;
pub mod crc;
pub mod packet;
pub mod parser;
pub mod record;
pub mod response;

pub use command::{
    ACK_BIT, CONFIG_CHUNK_SIZE, CONFIG_FIRST_CHUNK_SIZE, MAX_COMPRESSED_SIZE,
    MAX_CONFIG_FRAME_SIZE, MAX_START_FRAME_SIZE, Opcode, UPLOAD_CHUNK_SIZE, WriteConfigCommand,
};
pub use crc::crc16;
pub use packet::RecordKind;
pub use parser::{
    MAX_CONFIG_SIZE, WrappedConfig, parse_config, parse_config_response, serialize_config,
    strip_wrapper,
};
pub use record::Record;
pub use response::{Response, parse_firmware_version, read_opcode, strip_echo, validate_ack};
