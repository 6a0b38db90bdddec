/*!
 * Polling scheduler.
 *
 * At most one polling task is alive at a time. Arming always cancels the
 * previous task first. Cancelling never interrupts a cycle that is already
 * running; the task notices the cancellation before it would wait again.
 */
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use brickwire_core::utils::positive_millis;

use crate::error::{Error, Result};

struct PollTimer {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Fixed-delay polling timer with out-of-band flush
pub struct PollScheduler {
    delay_ms: Arc<AtomicI64>,
    flush: Arc<Notify>,
    timer: Mutex<Option<PollTimer>>,
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("delay_ms", &self.delay_ms())
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl PollScheduler {
    /// Create an idle scheduler with the given delay between cycles
    pub fn new(delay_ms: i64) -> Self {
        Self {
            delay_ms: Arc::new(AtomicI64::new(delay_ms)),
            flush: Arc::new(Notify::new()),
            timer: Mutex::new(None),
        }
    }

    /// Current delay between cycles in milliseconds
    pub fn delay_ms(&self) -> i64 {
        self.delay_ms.load(Ordering::SeqCst)
    }

    /// Change the delay. Zero or less cancels the running timer; a positive
    /// value is picked up by an armed timer before its next wait.
    pub fn set_delay(&self, delay_ms: i64) {
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
        if delay_ms <= 0 {
            self.cancel();
        }
    }

    /// Wake the timer so the next cycle runs now.
    ///
    /// Without an armed timer the request is kept and consumed by the next
    /// armed cycle.
    pub fn request_flush(&self) {
        self.flush.notify_one();
    }

    /// Whether a polling task is alive
    pub fn is_armed(&self) -> bool {
        self.lock_timer()
            .as_ref()
            .map_or(false, |timer| !timer.task.is_finished())
    }

    /// Cancel the current timer, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        match self.lock_timer().take() {
            Some(timer) => {
                let _ = timer.cancel.send(true);
                let was_running = !timer.task.is_finished();
                if was_running {
                    debug!("Cancelled polling timer");
                }
                was_running
            }
            None => false,
        }
    }

    /// Cancel any current timer and start a new one running `cycle`.
    ///
    /// The task waits out the delay (or a flush), runs one cycle, and repeats.
    /// It stops when cancelled, when the delay drops to zero or less, or when
    /// `cycle` resolves to false. Returns false without arming when the delay
    /// is not positive.
    pub fn arm<F, Fut>(&self, mut cycle: F) -> Result<bool>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.cancel();

        let delay_ms = self.delay_ms();
        if positive_millis(delay_ms).is_none() {
            debug!("Update delay is {} ms, polling stays idle", delay_ms);
            return Ok(false);
        }

        let handle = Handle::try_current()
            .map_err(|e| Error::Scheduler(format!("No runtime to poll on: {}", e)))?;

        let (cancel, mut cancelled) = watch::channel(false);
        let delay = self.delay_ms.clone();
        let flush = self.flush.clone();

        let task = handle.spawn(async move {
            loop {
                let Some(interval) = positive_millis(delay.load(Ordering::SeqCst)) else {
                    break;
                };

                tokio::select! {
                    _ = cancelled.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                    _ = flush.notified() => debug!("Flush requested"),
                }
                if *cancelled.borrow() {
                    break;
                }

                if !cycle().await {
                    break;
                }
            }
            debug!("Polling task stopped");
        });

        *self.lock_timer() = Some(PollTimer { cancel, task });
        info!("Polling armed every {} ms", delay_ms);
        Ok(true)
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<PollTimer>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting(count: &Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<bool> + Send {
        let count = count.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(true)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_at_fixed_delay() {
        let scheduler = PollScheduler::new(100);
        let count = Arc::new(AtomicUsize::new(0));

        assert!(scheduler.arm(counting(&count)).unwrap());
        assert!(scheduler.is_armed());

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_positive_delay_does_not_arm() {
        let scheduler = PollScheduler::new(0);
        let count = Arc::new(AtomicUsize::new(0));

        assert!(!scheduler.arm(counting(&count)).unwrap());
        assert!(!scheduler.is_armed());

        scheduler.set_delay(-5);
        assert!(!scheduler.arm(counting(&count)).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_cancels_and_positive_does_not_rearm() {
        let scheduler = PollScheduler::new(50);
        let count = Arc::new(AtomicUsize::new(0));
        scheduler.arm(counting(&count)).unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        scheduler.set_delay(0);
        assert!(!scheduler.is_armed());

        scheduler.set_delay(50);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!scheduler.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_timer() {
        let scheduler = PollScheduler::new(100);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        scheduler.arm(counting(&first)).unwrap();
        scheduler.arm(counting(&second)).unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_runs_cycle_early() {
        let scheduler = PollScheduler::new(10_000);
        let count = Arc::new(AtomicUsize::new(0));
        scheduler.arm(counting(&count)).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        scheduler.request_flush();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_before_arming_is_kept() {
        let scheduler = PollScheduler::new(10_000);
        let count = Arc::new(AtomicUsize::new(0));

        scheduler.request_flush();
        scheduler.arm(counting(&count)).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_returning_false_stops_task() {
        let scheduler = PollScheduler::new(10);
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();

        scheduler
            .arm(move || {
                seen.fetch_add(1, Ordering::SeqCst);
                std::future::ready(false)
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_armed());
    }

    #[test]
    fn test_arm_without_runtime_fails() {
        let scheduler = PollScheduler::new(10);
        let result = scheduler.arm(|| std::future::ready(true));
        assert!(matches!(result, Err(Error::Scheduler(_))));
    }
}
