/*!
 * Motor with a quadrature encoder.
 *
 * Each cycle the motor sends a 10-bit command field (bit 0 enable, bit 1
 * direction, bits 2..9 speed magnitude) and receives an encoder word whose
 * lowest bit is the sign and whose remaining bits are the magnitude.
 */
use std::sync::{Mutex, PoisonError};

use tracing::trace;

use brickwire_core::bits::{read_bits, BitBuffer};

use crate::device::{ControllerLink, Motor, Result};

/// Width of the command field on the wire
pub const MOTOR_COMMAND_BITS: usize = 10;

/// Largest speed magnitude the board accepts
pub const MAX_SPEED: i16 = 255;

#[derive(Debug, Default, Clone, Copy)]
struct MotorState {
    enabled: bool,
    speed: i16,
    raw_encoder: u32,
    encoder: i64,
}

/// A motor driven by speed and direction, reporting its encoder count
#[derive(Default)]
pub struct EncoderMotor {
    state: Mutex<MotorState>,
    controller: Mutex<Option<ControllerLink>>,
}

impl std::fmt::Debug for EncoderMotor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderMotor")
            .field("state", &self.snapshot())
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl EncoderMotor {
    /// Create a disabled motor at rest
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signed speed, clamped to `-255..=255`, and request a flush
    pub fn set_speed(&self, speed: i16) {
        self.lock_state().speed = speed.clamp(-MAX_SPEED, MAX_SPEED);
        self.request_flush();
    }

    /// Enable or disable the motor driver and request a flush
    pub fn set_enabled(&self, enabled: bool) {
        self.lock_state().enabled = enabled;
        self.request_flush();
    }

    /// The commanded signed speed
    pub fn speed(&self) -> i16 {
        self.snapshot().speed
    }

    /// Whether the driver is enabled
    pub fn enabled(&self) -> bool {
        self.snapshot().enabled
    }

    /// Signed encoder count from the last response
    pub fn encoder(&self) -> i64 {
        self.snapshot().encoder
    }

    /// Encoder word exactly as received
    pub fn raw_encoder(&self) -> u32 {
        self.snapshot().raw_encoder
    }

    /// Whether the motor is currently attached to a controller
    pub fn is_attached(&self) -> bool {
        self.controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(false, |link| link.strong_count() > 0)
    }

    fn snapshot(&self) -> MotorState {
        *self.lock_state()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MotorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_flush(&self) {
        let link = self
            .controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(sink) = link.and_then(|link| link.upgrade()) {
            sink.request_flush();
        }
    }
}

impl Motor for EncoderMotor {
    fn encode_value_request(&self, buffer: &mut BitBuffer, offset: usize) -> usize {
        let state = self.snapshot();
        let direction = u32::from(state.speed < 0);
        let magnitude = u32::from(state.speed.unsigned_abs()) & 0xFF;
        let field = (magnitude << 2) | (direction << 1) | u32::from(state.enabled);
        buffer.write(offset, MOTOR_COMMAND_BITS, field);
        offset + MOTOR_COMMAND_BITS
    }

    fn decode_values(&self, bit_len: usize, response: &[u8], offset: usize) -> Result<()> {
        let raw = read_bits(response, offset, bit_len)?;
        let magnitude = i64::from(raw >> 1);
        let encoder = if raw & 1 != 0 { -magnitude } else { magnitude };

        let mut state = self.lock_state();
        state.raw_encoder = raw;
        state.encoder = encoder;
        trace!("Encoder word {:#x} ({} bits) decoded to {}", raw, bit_len, encoder);
        Ok(())
    }

    fn set_controller(&self, link: Option<ControllerLink>) {
        *self.controller.lock().unwrap_or_else(PoisonError::into_inner) = link;
    }
}
