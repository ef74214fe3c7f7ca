//! Configuration TLV stream parsing and serialization.
//!
//! Serialized (write) form:
//! ```text
//! ┌──────────┬─────────┬──────────────────────────┬────────────┐
//! │ reserved │ version │ [num][type][payload] ... │ CRC16 (LE) │
//! │ 2 bytes  │ 1 byte  │     fixed per type       │  2 bytes   │
//! └──────────┴─────────┴──────────────────────────┴────────────┘
//! ```
//!
//! Device responses use the same envelope except that the first two bytes
//! carry the little-endian total length.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ConfigError, Error, Result};
use crate::protocol::crc::crc16;
use crate::protocol::packet::RecordKind;
use crate::protocol::record::Record;
use crate::types::config::MAX_INSTANCES;
use crate::types::{BinaryInputs, DataBus, DisplayConfig, GlobalConfig, LedConfig, SensorData};

/// Maximum serialized config size, including the CRC.
pub const MAX_CONFIG_SIZE: usize = 4096;

/// Size of the wrapper header (length/reserved + version).
pub const WRAPPER_HEADER_SIZE: usize = 3;

/// Size of the trailing CRC.
pub const CRC_SIZE: usize = 2;

/// A config response with its outer wrapper removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedConfig<'a> {
    /// Length declared in the wrapper header.
    pub declared_length: u16,
    /// Config format version.
    pub version: u8,
    /// Packet records.
    pub body: &'a [u8],
    /// Trailing CRC, if the response was long enough to carry one.
    pub crc: Option<u16>,
}

impl WrappedConfig<'_> {
    /// Returns true if the trailing CRC matches the header and body.
    ///
    /// The checksum covers everything before it, including the length
    /// header, so it is recomputed from the original response.
    #[must_use]
    pub fn crc_matches(&self, response: &[u8]) -> bool {
        let Some(crc) = self.crc else {
            return false;
        };
        let covered = WRAPPER_HEADER_SIZE + self.body.len();
        response.len() >= covered && crc16(&response[..covered]) == crc
    }
}

/// Removes the `[length:2LE][version:1]` header and trailing CRC.
pub fn strip_wrapper(data: &[u8]) -> Result<WrappedConfig<'_>> {
    if data.len() < WRAPPER_HEADER_SIZE {
        return Err(ConfigError::WrapperTooShort(data.len()).into());
    }

    let declared_length = u16::from_le_bytes([data[0], data[1]]);
    let version = data[2];
    let rest = &data[WRAPPER_HEADER_SIZE..];

    let body_len = rest.len().saturating_sub(CRC_SIZE);
    let body = &rest[..body_len];
    let crc = (rest.len() >= CRC_SIZE)
        .then(|| u16::from_le_bytes([rest[body_len], rest[body_len + 1]]));

    Ok(WrappedConfig {
        declared_length,
        version,
        body,
        crc,
    })
}

/// Per-kind staging of records keyed by record number.
#[derive(Default)]
struct Staging {
    displays: BTreeMap<u8, DisplayConfig>,
    leds: BTreeMap<u8, LedConfig>,
    sensors: BTreeMap<u8, SensorData>,
    data_buses: BTreeMap<u8, DataBus>,
    binary_inputs: BTreeMap<u8, BinaryInputs>,
}

fn decode_at<R: Record>(payload: &[u8]) -> Result<R> {
    Ok(R::decode(payload)?)
}

fn into_limited<V>(kind: RecordKind, map: BTreeMap<u8, V>) -> Vec<V> {
    if map.len() > MAX_INSTANCES {
        tracing::warn!(
            "config has {} {} records, keeping the first {}",
            map.len(),
            kind.name(),
            MAX_INSTANCES
        );
    }
    map.into_values().take(MAX_INSTANCES).collect()
}

/// Parses the packet records of a config body.
///
/// The walk stops without error at an unknown type id, which tolerates
/// trailing padding and record kinds added by newer firmware. A known record
/// whose payload is cut short is an error.
pub fn parse_config(data: &[u8], version: u8) -> Result<GlobalConfig> {
    let mut config = GlobalConfig::new(version);
    let mut staging = Staging::default();
    let mut pos = 0;

    while pos + 2 <= data.len() {
        let number = data[pos];
        let type_id = data[pos + 1];

        let Some(kind) = RecordKind::from_type_id(type_id) else {
            tracing::debug!("stopping config walk at offset {pos}: unknown type 0x{type_id:02x}");
            break;
        };

        let start = pos + 2;
        let end = start + kind.size();
        if end > data.len() {
            return Err(ConfigError::Truncated {
                type_id,
                expected: kind.size(),
                got: data.len() - start,
            }
            .into());
        }
        let payload = &data[start..end];

        tracing::trace!(
            "config record #{number} {} ({} bytes)",
            kind.name(),
            kind.size()
        );

        match kind {
            RecordKind::System => config.system = Some(decode_at(payload)?),
            RecordKind::Manufacturer => config.manufacturer = Some(decode_at(payload)?),
            RecordKind::Power => config.power = Some(decode_at(payload)?),
            RecordKind::Display => {
                staging.displays.insert(number, decode_at(payload)?);
            }
            RecordKind::Led => {
                staging.leds.insert(number, decode_at(payload)?);
            }
            RecordKind::Sensor => {
                staging.sensors.insert(number, decode_at(payload)?);
            }
            RecordKind::DataBus => {
                staging.data_buses.insert(number, decode_at(payload)?);
            }
            RecordKind::BinaryInput => {
                staging.binary_inputs.insert(number, decode_at(payload)?);
            }
        }

        pos = end;
    }

    config.displays = into_limited(RecordKind::Display, staging.displays);
    config.leds = into_limited(RecordKind::Led, staging.leds);
    config.sensors = into_limited(RecordKind::Sensor, staging.sensors);
    config.data_buses = into_limited(RecordKind::DataBus, staging.data_buses);
    config.binary_inputs = into_limited(RecordKind::BinaryInput, staging.binary_inputs);
    config.loaded = true;

    Ok(config)
}

/// Parses a full config response (wrapper included).
///
/// A CRC mismatch is logged but does not fail the parse.
pub fn parse_config_response(data: &[u8]) -> Result<GlobalConfig> {
    let wrapped = strip_wrapper(data)?;

    if usize::from(wrapped.declared_length) != data.len() {
        tracing::debug!(
            "config wrapper declares {} bytes, response has {}",
            wrapped.declared_length,
            data.len()
        );
    }
    if !wrapped.crc_matches(data) {
        tracing::warn!("config response CRC mismatch, parsing anyway");
    }

    parse_config(wrapped.body, wrapped.version)
}

fn put_record<R: Record>(buf: &mut BytesMut, number: u8, record: &R) {
    buf.put_u8(number);
    buf.put_u8(R::KIND.into());
    record.encode_into(buf);
}

fn put_all<R: Record>(buf: &mut BytesMut, records: &[R]) {
    for (index, record) in records.iter().enumerate() {
        // validate() caps every list at MAX_INSTANCES
        put_record(buf, index as u8, record);
    }
}

/// Serializes a config into the device's write format.
pub fn serialize_config(config: &GlobalConfig) -> Result<Bytes> {
    config.validate()?;

    let mut buf = BytesMut::with_capacity(MAX_CONFIG_SIZE);
    buf.put_u16_le(0); // reserved
    buf.put_u8(config.version);

    if let Some(system) = &config.system {
        put_record(&mut buf, 0, system);
    }
    if let Some(manufacturer) = &config.manufacturer {
        put_record(&mut buf, 0, manufacturer);
    }
    if let Some(power) = &config.power {
        put_record(&mut buf, 0, power);
    }
    put_all(&mut buf, &config.displays);
    put_all(&mut buf, &config.leds);
    put_all(&mut buf, &config.sensors);
    put_all(&mut buf, &config.data_buses);
    put_all(&mut buf, &config.binary_inputs);

    let total = buf.len() + CRC_SIZE;
    if total > MAX_CONFIG_SIZE {
        return Err(Error::SizeLimit {
            size: total,
            max: MAX_CONFIG_SIZE,
        });
    }

    let crc = crc16(&buf);
    buf.put_u16_le(crc);

    Ok(buf.freeze())
}
