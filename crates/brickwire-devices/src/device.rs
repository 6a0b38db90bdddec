/*!
 * Device contract and port identities.
 *
 * Every sensor and motor that takes part in the wire protocol implements
 * [`Sensor`] or [`Motor`]. The protocol codec only ever talks to devices
 * through these traits, so new device kinds plug in without touching it.
 */
use std::fmt::{self, Debug};
use std::sync::{Arc, Weak};

use thiserror::Error;

use brickwire_core::bits::BitBuffer;
use brickwire_core::config::LINK_TARGETS;
use brickwire_core::error::Error as CoreError;

/// Sensor or motor slots on each link target
pub const SLOTS_PER_LINK: usize = 2;

/// Ports per category across both link targets
pub const PORTS: usize = LINK_TARGETS * SLOTS_PER_LINK;

/// Device type code sent for an empty sensor slot
pub const NO_DEVICE: u8 = 0;

/// Error type for device operations
#[derive(Error, Debug)]
pub enum DeviceError {
    /// A device could not make sense of its part of a response
    #[error("Decode error: {0}")]
    Decode(String),

    /// The handle is already attached to another port
    #[error("Device handle already attached to {0}")]
    HandleInUse(String),

    /// No port exists at this index
    #[error("Invalid port index: {0}")]
    InvalidPort(usize),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Receiver of out-of-band flush requests from attached motors
pub trait FlushSink: Send + Sync {
    /// Ask for a value exchange as soon as possible
    fn request_flush(&self);
}

/// Non-owning back-reference from a motor to the controller it is attached to
pub type ControllerLink = Weak<dyn FlushSink>;

/// A sensor attached to one of the sensor ports
pub trait Sensor: Send + Sync + Debug {
    /// One-byte type code sent in the sensor setup message
    fn type_code(&self) -> u8;

    /// Append configuration bits at `offset`, returning the offset after them
    fn encode_setup(&self, _buffer: &mut BitBuffer, offset: usize) -> usize {
        offset
    }

    /// Append per-cycle request bits at `offset`, returning the offset after them
    fn encode_value_request(&self, _buffer: &mut BitBuffer, offset: usize) -> usize {
        offset
    }

    /// Read this sensor's field from a value response starting at `offset`.
    ///
    /// Returns the offset immediately after the field.
    fn decode_values(&self, response: &[u8], offset: usize) -> Result<usize>;
}

/// A motor attached to one of the motor ports
pub trait Motor: Send + Sync + Debug {
    /// Append the per-cycle command field at `offset`, returning the offset after it
    fn encode_value_request(&self, buffer: &mut BitBuffer, offset: usize) -> usize;

    /// Read this motor's encoder word of `bit_len` bits starting at `offset`
    fn decode_values(&self, bit_len: usize, response: &[u8], offset: usize) -> Result<()>;

    /// Set or clear the back-reference used to request a flush
    fn set_controller(&self, link: Option<ControllerLink>);
}

/// Shared sensor handle
pub type SharedSensor = Arc<dyn Sensor>;

/// Shared motor handle
pub type SharedMotor = Arc<dyn Motor>;

/// Compare two handles by identity, ignoring vtables
pub(crate) fn same_handle<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

macro_rules! port_type {
    ($(#[$meta:meta])* $name:ident, $label:literal, [$($variant:ident),+]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $(
                #[allow(missing_docs)]
                $variant,
            )+
        }

        impl $name {
            /// All ports in wire order
            pub const ALL: [$name; PORTS] = [$($name::$variant),+];

            /// Port index, `link * 2 + slot`
            pub fn index(self) -> usize {
                self as usize
            }

            /// Index of the link target serving this port
            pub fn link(self) -> usize {
                self.index() / SLOTS_PER_LINK
            }

            /// Slot within the link target
            pub fn slot(self) -> usize {
                self.index() % SLOTS_PER_LINK
            }

            /// Port served by `slot` of link target `link`
            pub fn on_link(link: usize, slot: usize) -> Result<Self> {
                Self::try_from(link * SLOTS_PER_LINK + slot)
            }
        }

        impl TryFrom<usize> for $name {
            type Error = DeviceError;

            fn try_from(index: usize) -> Result<Self> {
                Self::ALL
                    .get(index)
                    .copied()
                    .ok_or(DeviceError::InvalidPort(index))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, " {:?}"), self)
            }
        }
    };
}

port_type!(
    /// Sensor port identity
    SensorPort,
    "sensor port",
    [S1, S2, S3, S4]
);

port_type!(
    /// Motor port identity
    MotorPort,
    "motor port",
    [A, B, C, D]
);
