//! Scripted transport for engine tests.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use brickwire_devices::Transport;

#[derive(Debug, Default)]
struct Script {
    queued: HashMap<u8, VecDeque<io::Result<Vec<u8>>>>,
    fallback: HashMap<u8, Vec<u8>>,
    send_failures: usize,
    sent: Vec<(u8, Vec<u8>)>,
    last_address: Option<u8>,
}

/// Transport answering from per-address queues of canned responses
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    latency: Duration,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every receive, to widen the window for overlapping exchanges
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue one response (or failure) for the next receive after a send to `address`
    pub fn push(&self, address: u8, response: io::Result<Vec<u8>>) {
        self.lock()
            .queued
            .entry(address)
            .or_default()
            .push_back(response);
    }

    /// Response used for `address` once its queue is empty
    pub fn set_fallback(&self, address: u8, response: Vec<u8>) {
        self.lock().fallback.insert(address, response);
    }

    /// Fail the next `count` sends
    pub fn fail_sends(&self, count: usize) {
        self.lock().send_failures = count;
    }

    /// Every packet sent so far, with its address
    pub fn sent(&self) -> Vec<(u8, Vec<u8>)> {
        self.lock().sent.clone()
    }

    /// Packets sent to one address
    pub fn sent_to(&self, address: u8) -> Vec<Vec<u8>> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| *to == address)
            .map(|(_, packet)| packet)
            .collect()
    }

    /// Largest number of exchanges that were ever in progress at once
    pub fn max_concurrent_exchanges(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }
}

pub(crate) fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "no response")
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, address: u8, packet: &[u8]) -> io::Result<()> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let mut script = self.lock();
        script.sent.push((address, packet.to_vec()));
        script.last_address = Some(address);
        if script.send_failures > 0 {
            script.send_failures -= 1;
            drop(script);
            self.active.fetch_sub(1, Ordering::SeqCst);
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "send failed"));
        }
        Ok(())
    }

    async fn receive(&self, _timeout: Duration) -> io::Result<Vec<u8>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let response = {
            let mut script = self.lock();
            let address = script.last_address.unwrap_or_default();
            match script.queued.get_mut(&address).and_then(VecDeque::pop_front) {
                Some(response) => response,
                None => script.fallback.get(&address).cloned().ok_or_else(timed_out),
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        response
    }
}
