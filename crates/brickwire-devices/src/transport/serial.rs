/*!
 * Serial port transport.
 *
 * Wraps a blocking `serialport` handle. Reads and writes run on tokio's
 * blocking pool so the runtime threads never stall on the UART.
 */
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, info};

use brickwire_core::config::SerialConfig;

use super::frame::{decode_frame, encode_frame, RESPONSE_HEADER_LEN};
use super::Transport;

/// Transport over a local serial device
pub struct SerialTransport {
    device: String,
    port: Arc<Mutex<Box<dyn SerialPort>>>,
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("device", &self.device)
            .finish()
    }
}

impl SerialTransport {
    /// Open the serial device named in the configuration
    pub fn open(config: &SerialConfig) -> io::Result<Self> {
        let port = serialport::new(&config.device, config.baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;
        info!("Opened {} at {} baud", config.device, config.baud_rate);

        Ok(Self {
            device: config.device.clone(),
            port: Arc::new(Mutex::new(port)),
        })
    }

    async fn with_port<F, T>(&self, operation: F) -> io::Result<T>
    where
        F: FnOnce(&mut dyn SerialPort) -> io::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let port = self.port.clone();
        tokio::task::spawn_blocking(move || {
            let mut port = port.lock().unwrap_or_else(PoisonError::into_inner);
            operation(port.as_mut())
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&self, address: u8, packet: &[u8]) -> io::Result<()> {
        let frame = encode_frame(address, packet)?;
        debug!("Sending {} byte frame to address {}", frame.len(), address);

        self.with_port(move |port| {
            port.clear(ClearBuffer::Input)?;
            port.write_all(&frame)?;
            port.flush()
        })
        .await
    }

    async fn receive(&self, timeout: Duration) -> io::Result<Vec<u8>> {
        self.with_port(move |port| {
            port.set_timeout(timeout)?;

            let mut header = [0u8; RESPONSE_HEADER_LEN];
            port.read_exact(&mut header)?;

            let mut frame = vec![0u8; RESPONSE_HEADER_LEN + usize::from(header[1])];
            frame[..RESPONSE_HEADER_LEN].copy_from_slice(&header);
            port.read_exact(&mut frame[RESPONSE_HEADER_LEN..])?;

            decode_frame(&frame)
        })
        .await
    }
}
