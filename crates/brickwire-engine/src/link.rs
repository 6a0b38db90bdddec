/*!
 * Request/response transactions over the shared serial link.
 *
 * Both link targets sit on one half-duplex bus, so only one exchange may be
 * in flight at a time across the whole process. [`LinkBus::transact`] holds
 * the bus lock for the full retry loop.
 */
use std::fmt;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{trace, Instrument};

use brickwire_core::config::{LinkConfig, LINK_TARGETS};
use brickwire_core::logging::operation_span;
use brickwire_core::utils::with_retry;
use brickwire_devices::Transport;

use crate::error::{Error, Result};

/// The serial bus shared by the link targets
pub struct LinkBus {
    transport: Mutex<Box<dyn Transport>>,
    addresses: [u8; LINK_TARGETS],
    max_attempts: usize,
}

impl fmt::Debug for LinkBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkBus")
            .field("addresses", &self.addresses)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl LinkBus {
    /// Create a bus over a transport
    pub fn new(transport: Box<dyn Transport>, config: &LinkConfig) -> Self {
        Self {
            transport: Mutex::new(transport),
            addresses: config.addresses,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Bus address of a link target
    pub fn address(&self, link: usize) -> Result<u8> {
        self.addresses
            .get(link)
            .copied()
            .ok_or(Error::InvalidLink(link))
    }

    /// Send `packet` to a link target and wait up to `timeout` for its response.
    ///
    /// A failed send or receive repeats the whole exchange, up to the
    /// configured number of attempts. Only the last failure is reported.
    pub async fn transact(&self, link: usize, packet: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        let address = self.address(link)?;

        async {
            let transport = self.transport.lock().await;
            let transport: &dyn Transport = transport.as_ref();

            let response = with_retry(self.max_attempts, |attempt| async move {
                trace!(
                    "Attempt {}: {} bytes to address {}",
                    attempt,
                    packet.len(),
                    address
                );
                transport.send(address, packet).await?;
                transport.receive(timeout).await
            })
            .await
            .map_err(|(attempts, source)| Error::Transport {
                link,
                attempts,
                source,
            })?;

            trace!("Received {} bytes from address {}", response.len(), address);
            Ok(response)
        }
        .instrument(operation_span("transact", link))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{timed_out, ScriptedTransport};
    use std::io;
    use std::sync::Arc;

    fn bus(transport: &ScriptedTransport) -> LinkBus {
        LinkBus::new(Box::new(transport.clone()), &LinkConfig::default())
    }

    #[tokio::test]
    async fn test_transact_resolves_link_address() {
        let transport = ScriptedTransport::new();
        transport.push(2, Ok(vec![3, 1]));
        let bus = bus(&transport);

        let response = bus
            .transact(1, &[3, 0, 0], Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(response, vec![3, 1]);
        assert_eq!(transport.sent(), vec![(2, vec![3, 0, 0])]);
    }

    #[tokio::test]
    async fn test_transact_rejects_unknown_link() {
        let transport = ScriptedTransport::new();
        let bus = bus(&transport);

        let result = bus.transact(2, &[3], Duration::from_millis(50)).await;
        assert!(matches!(result, Err(Error::InvalidLink(2))));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_fifth_attempt_succeeds() {
        let transport = ScriptedTransport::new();
        for _ in 0..4 {
            transport.push(1, Err(timed_out()));
        }
        transport.push(1, Ok(vec![3, 5]));
        transport.push(1, Ok(vec![3, 6]));
        let bus = bus(&transport);

        let response = bus
            .transact(0, &[3], Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(response, vec![3, 5]);
        assert_eq!(transport.sent().len(), 5);
    }

    #[test_log::test(tokio::test)]
    async fn test_five_failures_surface_the_last() {
        let transport = ScriptedTransport::new();
        for attempt in 1..=5 {
            transport.push(
                1,
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("timeout {}", attempt),
                )),
            );
        }
        transport.push(1, Ok(vec![3]));
        let bus = bus(&transport);

        let err = bus
            .transact(0, &[3], Duration::from_millis(50))
            .await
            .unwrap_err();
        match err {
            Error::Transport {
                link,
                attempts,
                source,
            } => {
                assert_eq!(link, 0);
                assert_eq!(attempts, 5);
                assert_eq!(source.to_string(), "timeout 5");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(transport.sent().len(), 5);
    }

    #[tokio::test]
    async fn test_send_failure_is_retried() {
        let transport = ScriptedTransport::new();
        transport.fail_sends(2);
        transport.push(1, Ok(vec![2]));
        let bus = bus(&transport);

        let response = bus
            .transact(0, &[2, 0, 0], Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(response, vec![2]);
        assert_eq!(transport.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_configured_attempts() {
        let transport = ScriptedTransport::new();
        let config = LinkConfig {
            max_attempts: 2,
            ..LinkConfig::default()
        };
        let bus = LinkBus::new(Box::new(transport.clone()), &config);

        let result = bus.transact(0, &[3], Duration::from_millis(50)).await;
        assert!(matches!(result, Err(Error::Transport { attempts: 2, .. })));
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transactions_never_overlap() {
        let transport = ScriptedTransport::new().with_latency(Duration::from_millis(5));
        transport.set_fallback(1, vec![3]);
        transport.set_fallback(2, vec![3]);
        let bus = Arc::new(bus(&transport));

        let mut handles = Vec::new();
        for i in 0..8 {
            let bus = bus.clone();
            handles.push(tokio::spawn(async move {
                bus.transact(i % 2, &[3], Duration::from_millis(50)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(transport.sent().len(), 8);
        assert_eq!(transport.max_concurrent_exchanges(), 1);
    }
}
