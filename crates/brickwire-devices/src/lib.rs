/*!
 * Brickwire Devices
 *
 * This crate provides the device contract, the port registry, the stock
 * devices and the wire codec for the interface board.
 */

#![warn(missing_docs)]

// Re-export core types
pub use brickwire_core::prelude;

pub mod device;
pub mod devices;
pub mod protocol;
pub mod registry;
pub mod transport;

// Re-export device traits and port identities
pub use device::{
    ControllerLink, DeviceError, FlushSink, Motor, MotorPort, Result, Sensor, SensorPort,
    SharedMotor, SharedSensor, PORTS, SLOTS_PER_LINK,
};
pub use devices::{EncoderMotor, RawSensor};
pub use protocol::{MessageType, ValuesOutcome};
pub use registry::{LinkSlots, PortRegistry};
pub use transport::Transport;

/// Brickwire devices crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
