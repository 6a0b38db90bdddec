/*!
 * Brickwire Engine
 *
 * This crate drives the interface board: serialized request/response
 * transactions with retry, the controller that exposes the attached devices,
 * and the background poller that keeps their state current.
 */

#![warn(missing_docs)]

// Re-export core types
pub use brickwire_core::prelude;

pub mod controller;
pub mod error;
pub mod link;
pub mod listener;
pub mod scheduler;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use controller::Controller;
pub use error::{Error, Result};
pub use link::LinkBus;
pub use listener::{ListenerSet, SharedListener, UpdateListener};
pub use scheduler::PollScheduler;

/// Brickwire engine crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging and the engine
pub fn init() -> Result<()> {
    brickwire_core::init()?;
    tracing::info!("Brickwire Engine {} initialized", VERSION);
    Ok(())
}
