/*!
 * Wire messages exchanged with the interface board.
 *
 * Every packet starts with a one-byte [`MessageType`] tag. This module builds
 * the sensor setup, value exchange and watchdog packets from a [`LinkSlots`]
 * snapshot of one link target, and applies value responses back onto the
 * devices of that same snapshot.
 */
use std::fmt;

use tracing::{error, trace};

use brickwire_core::bits::{bytes_for_bits, read_bits, BitBuffer};

use crate::device::{DeviceError, Result, NO_DEVICE, SLOTS_PER_LINK};
use crate::registry::LinkSlots;

/// Bits reserved at the start of a value request for encoder offsets
pub const ENCODER_OFFSET_BITS: usize = 2;

/// Bits an empty motor slot occupies in a value request
pub const ABSENT_MOTOR_BITS: usize = 10;

/// Bits an empty sensor slot occupies in a value response
pub const ABSENT_SENSOR_BITS: usize = 10;

/// Width of each encoder word length field in a value response
pub const ENCODER_LENGTH_BITS: usize = 5;

/// Message type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Change the bus address of a target
    ChangeAddress = 1,
    /// Declare the attached sensor types
    SensorSetup = 2,
    /// Exchange motor commands for encoder and sensor readings
    Values = 3,
    /// Float all motors immediately
    EmergencyStop = 4,
    /// Set the motor watchdog timeout
    TimeoutSettings = 5,
}

impl MessageType {
    /// The tag byte
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(tag: u8) -> std::result::Result<Self, u8> {
        match tag {
            1 => Ok(MessageType::ChangeAddress),
            2 => Ok(MessageType::SensorSetup),
            3 => Ok(MessageType::Values),
            4 => Ok(MessageType::EmergencyStop),
            5 => Ok(MessageType::TimeoutSettings),
            other => Err(other),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.tag())
    }
}

/// What happened to a value response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuesOutcome {
    /// Encoder and sensor fields were applied to the attached devices
    Applied,
    /// The response did not carry a value tag and was left alone
    Ignored {
        /// The tag that was received, if the response was not empty
        tag: Option<u8>,
    },
}

/// Build the watchdog timeout packet: tag followed by the little-endian microseconds
pub fn timeout_packet(micros: u32) -> Vec<u8> {
    let mut packet = Vec::with_capacity(5);
    packet.push(MessageType::TimeoutSettings.tag());
    packet.extend_from_slice(&micros.to_le_bytes());
    packet
}

/// Build the sensor setup packet for one link target.
///
/// The packet is the tag, the type codes of the two sensor slots (0 for an
/// empty slot) and the setup bits of the attached sensors, packed in slot order.
pub fn setup_packet(slots: &LinkSlots) -> Vec<u8> {
    let sensors = &slots.sensors;

    let mut bits = BitBuffer::new();
    let mut offset = 0;
    for sensor in sensors.iter().flatten() {
        offset = sensor.encode_setup(&mut bits, offset);
    }

    let mut packet = Vec::with_capacity(1 + SLOTS_PER_LINK + bytes_for_bits(offset));
    packet.push(MessageType::SensorSetup.tag());
    packet.extend(
        sensors
            .iter()
            .map(|slot| slot.as_ref().map_or(NO_DEVICE, |sensor| sensor.type_code())),
    );
    packet.extend_from_slice(&bits.to_bytes(offset));
    packet
}

/// Build the value request packet for one link target.
///
/// Layout after the tag: two zero bits for the unsupported encoder offsets,
/// one command field per motor slot (ten zero bits when empty), then the
/// request fields of the attached sensors (nothing for an empty slot).
pub fn values_packet(slots: &LinkSlots) -> Vec<u8> {
    let mut bits = BitBuffer::new();
    bits.clear(0, ENCODER_OFFSET_BITS);
    let mut offset = ENCODER_OFFSET_BITS;

    for slot in &slots.motors {
        offset = match slot {
            Some(motor) => motor.encode_value_request(&mut bits, offset),
            None => {
                bits.clear(offset, ABSENT_MOTOR_BITS);
                offset + ABSENT_MOTOR_BITS
            }
        };
    }

    for sensor in slots.sensors.iter().flatten() {
        offset = sensor.encode_value_request(&mut bits, offset);
    }

    trace!("Value request for link {} uses {} bits", slots.link, offset);

    let mut packet = Vec::with_capacity(1 + bytes_for_bits(offset));
    packet.push(MessageType::Values.tag());
    packet.extend_from_slice(&bits.to_bytes(offset));
    packet
}

/// Apply a value response from one link target to the attached devices.
///
/// A response without the value tag is ignored. The two encoder word lengths
/// come first, followed by the two encoder words, then one field per sensor
/// slot (ten bits when empty). A sensor that fails to decode is logged and the
/// remaining sensor fields of this response are skipped; errors before the
/// sensor section are returned.
pub fn apply_values_response(slots: &LinkSlots, response: &[u8]) -> Result<ValuesOutcome> {
    match response.first() {
        Some(&tag) if tag == MessageType::Values.tag() => {}
        other => {
            return Ok(ValuesOutcome::Ignored {
                tag: other.copied(),
            })
        }
    }

    let mut offset = 8;
    let mut lengths = [0usize; SLOTS_PER_LINK];
    for length in lengths.iter_mut() {
        *length = read_bits(response, offset, ENCODER_LENGTH_BITS)? as usize;
        offset += ENCODER_LENGTH_BITS;
    }

    for (slot, length) in slots.motors.iter().zip(lengths) {
        if let Some(motor) = slot {
            motor.decode_values(length, response, offset)?;
        }
        offset += length;
    }

    if let Err(e) = decode_sensors(slots, response, offset) {
        error!("Failed to decode sensor values from link {}: {}", slots.link, e);
    }

    Ok(ValuesOutcome::Applied)
}

fn decode_sensors(slots: &LinkSlots, response: &[u8], mut offset: usize) -> Result<usize> {
    for slot in &slots.sensors {
        offset = match slot {
            Some(sensor) => sensor.decode_values(response, offset)?,
            None => offset + ABSENT_SENSOR_BITS,
        };
    }
    Ok(offset)
}

/// Reject a malformed device field with context
pub fn decode_error<S: AsRef<str>>(msg: S) -> DeviceError {
    DeviceError::Decode(msg.as_ref().to_string())
}
