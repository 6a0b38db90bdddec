/*!
 * Raw analog sensor.
 *
 * The default occupant of a sensor port that was read before anything was
 * attached to it. It needs no setup and reports one 10-bit reading per cycle.
 */
use std::sync::atomic::{AtomicU32, Ordering};

use brickwire_core::bits::read_bits;

use crate::device::{Result, Sensor};

/// Width of a raw reading on the wire
pub const RAW_READING_BITS: usize = 10;

/// Type code of a raw sensor
pub const RAW_TYPE_CODE: u8 = 0;

/// A sensor reporting the unprocessed 10-bit port reading
#[derive(Debug, Default)]
pub struct RawSensor {
    value: AtomicU32,
}

impl RawSensor {
    /// Create a raw sensor with a zero reading
    pub fn new() -> Self {
        Self::default()
    }

    /// The last reading received
    pub fn value(&self) -> u32 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Sensor for RawSensor {
    fn type_code(&self) -> u8 {
        RAW_TYPE_CODE
    }

    fn decode_values(&self, response: &[u8], offset: usize) -> Result<usize> {
        let value = read_bits(response, offset, RAW_READING_BITS)?;
        self.value.store(value, Ordering::Relaxed);
        Ok(offset + RAW_READING_BITS)
    }
}
