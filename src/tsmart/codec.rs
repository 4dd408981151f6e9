use crate::error::{Error, Result};

use super::{DeviceState, RequestKind};

const DISCOVERY_PAYLOAD: [u8; 4] = [0x01, 0x00, 0x00, 0x54];
const CONFIGURATION_READ_PAYLOAD: [u8; 4] = [0x21, 0x00, 0x00, 0x74];
const CONTROL_READ_PAYLOAD: [u8; 4] = [0xF1, 0x00, 0x00, 0xA4];

// Control-read reply layout.
const POWER_OFFSET: usize = 3;
const SET_POINT_OFFSET: usize = 4;
const MODE_OFFSET: usize = 6;
const TEMPERATURE_OFFSET: usize = 7;
const HEATING_OFFSET: usize = 9;

/// Shortest control-read reply that carries every field.
pub const MIN_CONTROL_RESPONSE_LEN: usize = HEATING_OFFSET + 1;

pub const fn encode_request(kind: RequestKind) -> [u8; 4] {
    match kind {
        RequestKind::Discovery => DISCOVERY_PAYLOAD,
        RequestKind::ConfigurationRead => CONFIGURATION_READ_PAYLOAD,
        RequestKind::ControlRead => CONTROL_READ_PAYLOAD,
    }
}

/// Decode a control-read reply.
///
/// The protocol has no checksum, so any datagram of at least
/// [`MIN_CONTROL_RESPONSE_LEN`] bytes is accepted. Trailing bytes are ignored.
pub fn decode_control_response(data: &[u8]) -> Result<DeviceState> {
    if data.len() < MIN_CONTROL_RESPONSE_LEN {
        return Err(Error::MalformedResponse {
            len: data.len(),
            min: MIN_CONTROL_RESPONSE_LEN,
        });
    }

    Ok(DeviceState {
        current_temperature: read_tenths(data, TEMPERATURE_OFFSET),
        set_point: read_tenths(data, SET_POINT_OFFSET),
        mode: data[MODE_OFFSET],
        heating: data[HEATING_OFFSET] & 0x01 != 0,
        power: data[POWER_OFFSET] & 0x01 != 0,
    })
}

/// Little-endian i16 in tenths of a degree.
fn read_tenths(data: &[u8], offset: usize) -> f64 {
    let raw = i16::from_le_bytes([data[offset], data[offset + 1]]);
    f64::from(raw) / 10.0
}
