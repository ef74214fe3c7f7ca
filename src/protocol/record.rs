//! Fixed-size record codecs.
//!
//! Each record decodes from exactly [`RecordKind::size`] bytes and encodes
//! back to the same length. Fields are little-endian. Reserved regions are
//! copied verbatim in both directions.

use std::io::Cursor;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;
use crate::protocol::packet::RecordKind;
use crate::types::{
    BinaryInputs, DataBus, DisplayConfig, LedConfig, ManufacturerData, PowerOption, SensorData,
    SystemConfig,
};

/// A configuration record with a fixed wire layout.
pub trait Record: Sized {
    /// Kind identifying this record in the TLV stream.
    const KIND: RecordKind;

    /// Fixed wire size.
    const SIZE: usize = Self::KIND.size();

    /// Decodes a record from the first [`Self::SIZE`] bytes of `data`.
    fn decode(data: &[u8]) -> Result<Self, FrameError>;

    /// Writes exactly [`Self::SIZE`] bytes.
    fn encode_into(&self, buf: &mut BytesMut);

    /// Encodes the record.
    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        self.encode_into(&mut buf);
        debug_assert_eq!(buf.len(), Self::SIZE);
        buf.freeze()
    }
}

fn cursor_for<R: Record>(data: &[u8]) -> Result<Cursor<&[u8]>, FrameError> {
    if data.len() < R::SIZE {
        return Err(FrameError::TooShort {
            expected: R::SIZE,
            got: data.len(),
        });
    }
    Ok(Cursor::new(&data[..R::SIZE]))
}

fn take_array<const N: usize>(cursor: &mut Cursor<&[u8]>) -> [u8; N] {
    let mut out = [0u8; N];
    cursor.copy_to_slice(&mut out);
    out
}

impl Record for SystemConfig {
    const KIND: RecordKind = RecordKind::System;

    fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let mut c = cursor_for::<Self>(data)?;
        Ok(Self {
            ic_type: c.get_u16_le(),
            communication_modes: c.get_u8(),
            device_flags: c.get_u8(),
            pwr_pin: c.get_u8(),
            reserved: take_array(&mut c),
        })
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.ic_type);
        buf.put_u8(self.communication_modes);
        buf.put_u8(self.device_flags);
        buf.put_u8(self.pwr_pin);
        buf.put_slice(&self.reserved);
    }
}

impl Record for ManufacturerData {
    const KIND: RecordKind = RecordKind::Manufacturer;

    fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let mut c = cursor_for::<Self>(data)?;
        Ok(Self {
            manufacturer_id: c.get_u16_le(),
            board_type: c.get_u8(),
            board_revision: c.get_u8(),
            reserved: take_array(&mut c),
        })
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.manufacturer_id);
        buf.put_u8(self.board_type);
        buf.put_u8(self.board_revision);
        buf.put_slice(&self.reserved);
    }
}

impl Record for PowerOption {
    const KIND: RecordKind = RecordKind::Power;

    fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let mut c = cursor_for::<Self>(data)?;
        Ok(Self {
            power_mode: c.get_u8(),
            // 3-byte field, always fits in u32
            battery_capacity_mah: c.get_uint_le(3) as u32,
            sleep_timeout_ms: c.get_u16_le(),
            tx_power: c.get_u8(),
            sleep_flags: c.get_u8(),
            battery_sense_pin: c.get_u8(),
            battery_sense_enable_pin: c.get_u8(),
            battery_sense_flags: c.get_u8(),
            capacity_estimator: c.get_u8(),
            voltage_scaling_factor: c.get_u16_le(),
            deep_sleep_current_ua: c.get_u32_le(),
            deep_sleep_time_seconds: c.get_u16_le(),
            reserved: take_array(&mut c),
        })
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.power_mode);
        buf.put_uint_le(
            u64::from(self.battery_capacity_mah & Self::MAX_BATTERY_CAPACITY_MAH),
            3,
        );
        buf.put_u16_le(self.sleep_timeout_ms);
        buf.put_u8(self.tx_power);
        buf.put_u8(self.sleep_flags);
        buf.put_u8(self.battery_sense_pin);
        buf.put_u8(self.battery_sense_enable_pin);
        buf.put_u8(self.battery_sense_flags);
        buf.put_u8(self.capacity_estimator);
        buf.put_u16_le(self.voltage_scaling_factor);
        buf.put_u32_le(self.deep_sleep_current_ua);
        buf.put_u16_le(self.deep_sleep_time_seconds);
        buf.put_slice(&self.reserved);
    }
}

impl Record for DisplayConfig {
    const KIND: RecordKind = RecordKind::Display;

    fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let mut c = cursor_for::<Self>(data)?;
        Ok(Self {
            instance_number: c.get_u8(),
            display_technology: c.get_u8(),
            panel_ic_type: c.get_u16_le(),
            pixel_width: c.get_u16_le(),
            pixel_height: c.get_u16_le(),
            active_width_mm: c.get_u16_le(),
            active_height_mm: c.get_u16_le(),
            legacy_tagtype: c.get_u16_le(),
            rotation: c.get_u8(),
            reset_pin: c.get_u8(),
            busy_pin: c.get_u8(),
            dc_pin: c.get_u8(),
            cs_pin: c.get_u8(),
            data_pin: c.get_u8(),
            partial_update_support: c.get_u8(),
            color_scheme: c.get_u8(),
            transmission_modes: c.get_u8(),
            clk_pin: c.get_u8(),
            reserved_pins: take_array(&mut c),
            full_update_mc: c.get_u16_le(),
            reserved: take_array(&mut c),
        })
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.instance_number);
        buf.put_u8(self.display_technology);
        buf.put_u16_le(self.panel_ic_type);
        buf.put_u16_le(self.pixel_width);
        buf.put_u16_le(self.pixel_height);
        buf.put_u16_le(self.active_width_mm);
        buf.put_u16_le(self.active_height_mm);
        buf.put_u16_le(self.legacy_tagtype);
        buf.put_u8(self.rotation);
        buf.put_u8(self.reset_pin);
        buf.put_u8(self.busy_pin);
        buf.put_u8(self.dc_pin);
        buf.put_u8(self.cs_pin);
        buf.put_u8(self.data_pin);
        buf.put_u8(self.partial_update_support);
        buf.put_u8(self.color_scheme);
        buf.put_u8(self.transmission_modes);
        buf.put_u8(self.clk_pin);
        buf.put_slice(&self.reserved_pins);
        buf.put_u16_le(self.full_update_mc);
        buf.put_slice(&self.reserved);
    }
}

impl Record for LedConfig {
    const KIND: RecordKind = RecordKind::Led;

    fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let mut c = cursor_for::<Self>(data)?;
        Ok(Self {
            instance_number: c.get_u8(),
            led_type: c.get_u8(),
            led_1_r: c.get_u8(),
            led_2_g: c.get_u8(),
            led_3_b: c.get_u8(),
            led_4: c.get_u8(),
            led_flags: c.get_u8(),
            reserved: take_array(&mut c),
        })
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.instance_number);
        buf.put_u8(self.led_type);
        buf.put_u8(self.led_1_r);
        buf.put_u8(self.led_2_g);
        buf.put_u8(self.led_3_b);
        buf.put_u8(self.led_4);
        buf.put_u8(self.led_flags);
        buf.put_slice(&self.reserved);
    }
}

impl Record for SensorData {
    const KIND: RecordKind = RecordKind::Sensor;

    fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let mut c = cursor_for::<Self>(data)?;
        Ok(Self {
            instance_number: c.get_u8(),
            sensor_type: c.get_u16_le(),
            bus_id: c.get_u8(),
            reserved: take_array(&mut c),
        })
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.instance_number);
        buf.put_u16_le(self.sensor_type);
        buf.put_u8(self.bus_id);
        buf.put_slice(&self.reserved);
    }
}

impl Record for DataBus {
    const KIND: RecordKind = RecordKind::DataBus;

    fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let mut c = cursor_for::<Self>(data)?;
        Ok(Self {
            instance_number: c.get_u8(),
            bus_type: c.get_u8(),
            pin_1: c.get_u8(),
            pin_2: c.get_u8(),
            pin_3: c.get_u8(),
            pin_4: c.get_u8(),
            pin_5: c.get_u8(),
            pin_6: c.get_u8(),
            pin_7: c.get_u8(),
            bus_speed_hz: c.get_u32_le(),
            bus_flags: c.get_u8(),
            pullups: c.get_u8(),
            pulldowns: c.get_u8(),
            reserved: take_array(&mut c),
        })
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.instance_number);
        buf.put_u8(self.bus_type);
        buf.put_slice(&[
            self.pin_1, self.pin_2, self.pin_3, self.pin_4, self.pin_5, self.pin_6, self.pin_7,
        ]);
        buf.put_u32_le(self.bus_speed_hz);
        buf.put_u8(self.bus_flags);
        buf.put_u8(self.pullups);
        buf.put_u8(self.pulldowns);
        buf.put_slice(&self.reserved);
    }
}

impl Record for BinaryInputs {
    const KIND: RecordKind = RecordKind::BinaryInput;

    fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let mut c = cursor_for::<Self>(data)?;
        Ok(Self {
            instance_number: c.get_u8(),
            input_type: c.get_u8(),
            display_as: c.get_u8(),
            reserved_pins: take_array(&mut c),
            input_flags: c.get_u8(),
            invert: c.get_u8(),
            pullups: c.get_u8(),
            pulldowns: c.get_u8(),
            reserved: take_array(&mut c),
        })
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.instance_number);
        buf.put_u8(self.input_type);
        buf.put_u8(self.display_as);
        buf.put_slice(&self.reserved_pins);
        buf.put_u8(self.input_flags);
        buf.put_u8(self.invert);
        buf.put_u8(self.pullups);
        buf.put_u8(self.pulldowns);
        buf.put_slice(&self.reserved);
    }
}
