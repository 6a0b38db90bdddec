/*!
 * Prelude module for Brickwire Core.
 *
 * This module re-exports commonly used types and functions from the Brickwire Core crate
 * to make them easier to import.
 */

// Re-export error types
pub use crate::error::{Error, Result};

// Re-export the bit codec
pub use crate::bits::{bytes_for_bits, read_bits, BitBuffer};

// Re-export config types
pub use crate::config::{Config, ConfigBuilder, LINK_TARGETS};

// Re-export utility functions
pub use crate::utils::{positive_millis, with_retry};

// Re-export logging macros
pub use tracing::{debug, error, info, trace, warn};

// Re-export core initialization
pub use crate::init;
