/*!
 * Error types for the Brickwire core crate.
 */
use thiserror::Error;

/// Error type for Brickwire core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// A bit field extends past the end of the buffer being read
    #[error("Bit field out of range: {len} bits at offset {offset}, buffer holds {available} bits")]
    Codec {
        /// Starting bit offset of the field
        offset: usize,
        /// Width of the field in bits
        len: usize,
        /// Number of bits in the buffer
        available: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Brickwire core operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new configuration error
    pub fn config<S: AsRef<str>>(msg: S) -> Self {
        Error::Config(msg.as_ref().to_string())
    }

    /// Create a new runtime error
    pub fn runtime<S: AsRef<str>>(msg: S) -> Self {
        Error::Runtime(msg.as_ref().to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
