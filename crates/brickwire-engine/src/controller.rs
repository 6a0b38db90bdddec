/*!
 * Controller for one interface board.
 *
 * The controller owns the port registry, the serial bus and the polling
 * scheduler, and is the surface applications talk to. It is cheap to clone;
 * clones share the same board.
 */
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, trace, warn, Instrument};

use brickwire_core::config::{Config, LinkConfig, LINK_TARGETS};
use brickwire_core::logging::cycle_span;
use brickwire_devices::protocol::{
    apply_values_response, setup_packet, timeout_packet, values_packet,
};
use brickwire_devices::{
    ControllerLink, FlushSink, MotorPort, PortRegistry, SensorPort, SharedMotor, SharedSensor,
    Transport, ValuesOutcome,
};

use crate::error::Result;
use crate::link::LinkBus;
use crate::listener::{ListenerSet, SharedListener};
use crate::scheduler::PollScheduler;

struct Inner {
    link: LinkConfig,
    bus: LinkBus,
    ports: PortRegistry,
    scheduler: PollScheduler,
    listeners: ListenerSet,
    last_update: RwLock<Option<DateTime<Utc>>>,
    cycles: AtomicU64,
}

impl FlushSink for Inner {
    fn request_flush(&self) {
        self.scheduler.request_flush();
    }
}

/// Handle to an interface board and its attached devices
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("bus", &self.inner.bus)
            .field("scheduler", &self.inner.scheduler)
            .field("listeners", &self.inner.listeners)
            .field("last_update", &self.last_update())
            .finish()
    }
}

impl Controller {
    /// Create a controller talking over `transport`.
    ///
    /// Nothing is sent until [`Controller::setup_sensors`] or another wire
    /// operation is called.
    pub fn new(transport: Box<dyn Transport>, config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                link: config.link.clone(),
                bus: LinkBus::new(transport, &config.link),
                ports: PortRegistry::new(),
                scheduler: PollScheduler::new(config.polling.update_delay_ms),
                listeners: ListenerSet::new(),
                last_update: RwLock::new(None),
                cycles: AtomicU64::new(0),
            }),
        }
    }

    /// Open the configured serial device and create a controller on it
    #[cfg(feature = "serial")]
    pub fn open_serial(config: &Config) -> Result<Self> {
        let transport = brickwire_devices::transport::SerialTransport::open(&config.serial)
            .map_err(brickwire_core::error::Error::from)?;
        Ok(Self::new(Box::new(transport), config))
    }

    /// Attach a sensor to a port, or clear it with `None`
    pub fn set_sensor(&self, port: SensorPort, sensor: Option<SharedSensor>) -> Result<()> {
        Ok(self.inner.ports.set_sensor(port, sensor)?)
    }

    /// The sensor at a port; an empty port gets a raw sensor installed
    pub fn sensor(&self, port: SensorPort) -> SharedSensor {
        self.inner.ports.sensor(port)
    }

    /// Attach a motor to a port, or clear it with `None`.
    ///
    /// An attached motor can ask this controller for an immediate value
    /// exchange.
    pub fn set_motor(&self, port: MotorPort, motor: Option<SharedMotor>) -> Result<()> {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let link: ControllerLink = inner;
        Ok(self.inner.ports.set_motor(port, motor, &link)?)
    }

    /// The motor at a port, if any
    pub fn motor(&self, port: MotorPort) -> Option<SharedMotor> {
        self.inner.ports.motor(port)
    }

    /// Register a listener for completed polling cycles.
    /// Returns false if it was already registered.
    pub fn add_update_listener(&self, listener: SharedListener) -> bool {
        self.inner.listeners.add(listener)
    }

    /// Remove every registration of a listener
    pub fn remove_update_listener(&self, listener: &SharedListener) -> usize {
        self.inner.listeners.remove(listener)
    }

    /// Delay between polling cycles in milliseconds
    pub fn update_delay(&self) -> i64 {
        self.inner.scheduler.delay_ms()
    }

    /// Change the delay between polling cycles.
    ///
    /// Zero or less stops polling; a later positive value only takes effect
    /// after the next [`Controller::setup_sensors`].
    pub fn set_update_delay(&self, delay_ms: i64) {
        self.inner.scheduler.set_delay(delay_ms);
        debug!("Update delay set to {} ms", delay_ms);
    }

    /// Whether the polling task is running
    pub fn is_polling(&self) -> bool {
        self.inner.scheduler.is_armed()
    }

    /// When the last value exchange over both links completed
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self
            .inner
            .last_update
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Exchange one packet with a link target, retrying on transport failure
    pub async fn transact(
        &self,
        link: usize,
        packet: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        self.inner.bus.transact(link, packet, timeout).await
    }

    /// Set the motor watchdog timeout of both link targets
    pub async fn set_timeout(&self, micros: u32) -> Result<()> {
        let packet = timeout_packet(micros);
        for link in 0..LINK_TARGETS {
            self.transact(link, &packet, self.inner.link.command_timeout())
                .await?;
        }
        info!("Watchdog timeout set to {} us", micros);
        Ok(())
    }

    /// Declare the attached sensors to both link targets and start polling.
    ///
    /// Any running poller is stopped first. Returns whether polling was armed,
    /// which depends on the update delay being positive.
    pub async fn setup_sensors(&self) -> Result<bool> {
        self.inner.scheduler.cancel();

        for link in 0..LINK_TARGETS {
            let packet = setup_packet(&self.inner.ports.link_slots(link));
            trace!("Setup packet for link {}: {:?}", link, packet);
            self.transact(link, &packet, self.inner.link.setup_timeout())
                .await?;
        }
        info!("Sensor setup complete");

        let inner = Arc::downgrade(&self.inner);
        self.inner.scheduler.arm(move || {
            let inner = inner.clone();
            async move {
                match inner.upgrade() {
                    Some(inner) => {
                        Controller { inner }.poll_cycle().await;
                        true
                    }
                    None => false,
                }
            }
        })
    }

    /// Run one value exchange with both link targets now.
    ///
    /// A response that cannot be applied is logged and skipped; transport
    /// failures are returned.
    pub async fn update_values(&self) -> Result<()> {
        for link in 0..LINK_TARGETS {
            // request and response share one snapshot of the link's devices
            let slots = self.inner.ports.link_slots(link);
            let packet = values_packet(&slots);
            let response = self
                .transact(link, &packet, self.inner.link.values_timeout())
                .await?;

            match apply_values_response(&slots, &response) {
                Ok(ValuesOutcome::Applied) => trace!("Applied values from link {}", link),
                Ok(ValuesOutcome::Ignored { tag }) => {
                    debug!("Ignored response from link {} with tag {:?}", link, tag)
                }
                Err(e) => warn!("Could not apply values from link {}: {}", link, e),
            }
        }

        *self
            .inner
            .last_update
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        Ok(())
    }

    async fn poll_cycle(&self) {
        let cycle = self.inner.cycles.fetch_add(1, Ordering::SeqCst) + 1;

        async {
            if let Err(e) = self.update_values().await {
                error!("Polling cycle failed: {}", e);
                return;
            }

            for listener in self.inner.listeners.snapshot() {
                let notified = catch_unwind(AssertUnwindSafe(|| listener.update_received(self)));
                if let Err(panic) = notified {
                    error!("Update listener panicked: {}", panic_message(panic.as_ref()));
                }
            }
        }
        .instrument(cycle_span(cycle))
        .await
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
