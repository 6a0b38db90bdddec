/*!
 * Brickwire Core
 *
 * This crate provides the shared foundations of Brickwire: the bit codec used
 * by every wire message, configuration, logging and the error type.
 */

#![warn(missing_docs)]

pub mod bits;
pub mod config;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod utils;

/// Brickwire core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library initialization
pub fn init() -> Result<(), error::Error> {
    logging::init()?;
    tracing::info!("Brickwire Core {} initialized", VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
