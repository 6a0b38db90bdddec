/*!
 * Transport boundary to the serial bus.
 *
 * The engine only needs two primitives from the physical link: send a packet
 * to one bus address, and wait for the next complete response.
 */
use std::fmt::Debug;
use std::io;
use std::time::Duration;

use async_trait::async_trait;

pub mod frame;

#[cfg(feature = "serial")]
pub mod serial;

pub use frame::{decode_frame, encode_frame};

#[cfg(feature = "serial")]
pub use serial::SerialTransport;

/// A half-duplex link to the board.
///
/// Callers serialize access themselves; an implementation never sees two
/// exchanges interleaved.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Write one packet to the target at `address`
    async fn send(&self, address: u8, packet: &[u8]) -> io::Result<()>;

    /// Wait up to `timeout` for one complete response packet
    async fn receive(&self, timeout: Duration) -> io::Result<Vec<u8>>;
}
