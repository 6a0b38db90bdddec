/*!
 * Error types for the Brickwire engine crate.
 */
use std::io;

use thiserror::Error;

/// Error type for Brickwire engine operations
#[derive(Error, Debug)]
pub enum Error {
    /// Every attempt of a transaction failed; carries the last failure
    #[error("Transport error on link {link} after {attempts} attempts: {source}")]
    Transport {
        /// Index of the link target
        link: usize,
        /// Attempts made before giving up
        attempts: usize,
        /// The failure of the last attempt
        #[source]
        source: io::Error,
    },

    /// No link target exists at this index
    #[error("Invalid link index: {0}")]
    InvalidLink(usize),

    /// The polling task could not be started
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Device error
    #[error("Device error: {0}")]
    Device(#[from] brickwire_devices::DeviceError),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] brickwire_core::error::Error),
}

/// Result type for Brickwire engine operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error came from the serial link rather than local state
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }
}
