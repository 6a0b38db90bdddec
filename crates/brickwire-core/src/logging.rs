/*!
 * Logging functionality for Brickwire.
 *
 * This module provides tracing setup and the spans used around wire
 * operations.
 */
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Initialize the logging system with default configuration
pub fn init() -> Result<()> {
    init_with_filter("info")
}

/// Initialize the logging system from a logging configuration section
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    init_with_filter(&config.level)
}

/// Initialize the logging system with a specific filter
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "debug", "brickwire_engine=trace")
pub fn init_with_filter(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| Error::runtime(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// A type alias for a tracing span
pub type Span = tracing::Span;

/// Create a new span for an operation on one link target
///
/// # Arguments
///
/// * `name` - The name of the operation
/// * `link` - Index of the link target the operation talks to
pub fn operation_span(name: &str, link: usize) -> Span {
    tracing::debug_span!("operation", name = %name, link = link)
}

/// Create a new span for one polling cycle
pub fn cycle_span(cycle: u64) -> Span {
    tracing::debug_span!("poll_cycle", cycle = cycle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::{prelude::*, EnvFilter};

    #[test]
    fn test_init() {
        // Only the first initialization in a process succeeds
        let _ = init();
        assert!(init().is_err());
    }

    #[test]
    fn test_spans_follow_filter_level() {
        let verbose = tracing_subscriber::registry().with(EnvFilter::new("debug"));
        tracing::subscriber::with_default(verbose, || {
            let span = operation_span("transact", 1);
            assert!(!span.is_disabled());
            assert_eq!(span.metadata().map(|meta| meta.name()), Some("operation"));
            assert!(!cycle_span(7).is_disabled());
        });

        let quiet = tracing_subscriber::registry().with(EnvFilter::new("info"));
        tracing::subscriber::with_default(quiet, || {
            assert!(operation_span("transact", 0).is_disabled());
            assert!(cycle_span(8).is_disabled());
        });
    }
}
