//! Periodic eviction of unanswered capture requests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::caller::Delivery;
use crate::clock::Clock;
use crate::pending::PendingRequests;

const SWEEPER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::sweeper");
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Message delivered to callers whose request timed out.
pub const TIMEOUT_MESSAGE: &str = "capture request timed out: agent did not respond";

/// Evicts pending requests older than the response timeout.
pub struct TimeoutSweeper {
    pending: Arc<PendingRequests>,
    clock: Arc<dyn Clock>,
    max_age: Duration,
}

impl TimeoutSweeper {
    /// Creates a sweeper with the given response timeout.
    pub fn new(pending: Arc<PendingRequests>, clock: Arc<dyn Clock>, max_age: Duration) -> Self {
        Self {
            pending,
            clock,
            max_age,
        }
    }

    /// Runs one sweep and returns the number of evicted requests.
    ///
    /// Each evicted caller is told about the timeout once; delivery failures
    /// are logged and dropped.
    pub fn sweep_once(&self) -> usize {
        let expired = self.pending.sweep_expired(self.clock.now(), self.max_age);
        for request in &expired {
            warn!(
                target: SWEEPER_TARGET,
                token = %request.token,
                agent = %request.target_agent_id,
                "capture request timed out"
            );
            if let Err(error) = request.caller.deliver(Delivery::text(TIMEOUT_MESSAGE)) {
                warn!(
                    target: SWEEPER_TARGET,
                    token = %request.token,
                    %error,
                    "timeout notification failed"
                );
            }
        }
        if !expired.is_empty() {
            debug!(
                target: SWEEPER_TARGET,
                evicted = expired.len(),
                remaining = self.pending.len(),
                "sweep completed"
            );
        }
        expired.len()
    }

    /// Runs the sweeper on a background thread every `interval`.
    pub fn spawn(self, interval: Duration) -> SweeperHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = thread::spawn(move || self.run(interval, &flag));
        SweeperHandle {
            shutdown,
            handle: Some(handle),
        }
    }

    fn run(&self, interval: Duration, shutdown: &AtomicBool) {
        info!(
            target: SWEEPER_TARGET,
            interval_ms = interval.as_millis(),
            timeout_ms = self.max_age.as_millis(),
            "timeout sweeper active"
        );
        let mut next_tick = Instant::now() + interval;
        while !shutdown.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= next_tick {
                self.sweep_once();
                next_tick = now + interval;
                continue;
            }
            thread::sleep(SHUTDOWN_POLL.min(next_tick - now));
        }
    }
}

/// Errors surfaced while stopping the sweeper.
#[derive(Debug, Error)]
pub enum SweeperError {
    /// The sweeper thread panicked.
    #[error("timeout sweeper thread panicked")]
    ThreadPanic,
}

/// Handle to the background sweeper thread.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SweeperHandle {
    /// Requests the sweeper to stop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the sweeper thread to finish.
    ///
    /// # Errors
    ///
    /// Returns [`SweeperError::ThreadPanic`] if the thread panicked.
    pub fn join(mut self) -> Result<(), SweeperError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| SweeperError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}
