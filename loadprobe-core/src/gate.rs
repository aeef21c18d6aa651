use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Hands out request ids until the request budget or the deadline runs out.
///
/// Workers race on a single counter, so each id is claimed exactly once and the number of
/// claimed ids never exceeds `requests`.
#[derive(Debug)]
pub struct RequestGate {
    counter: AtomicU64,
    requests: Option<u64>,
    duration: Option<Duration>,
    deadline: OnceLock<Instant>,
    closed: AtomicBool,
}

impl RequestGate {
    pub fn new(requests: Option<u64>, duration: Option<Duration>) -> Self {
        Self {
            counter: AtomicU64::new(0),
            requests,
            duration,
            deadline: OnceLock::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn start_at(&self, started: Instant) {
        if self.deadline.get().is_some() {
            return;
        }

        if let Some(duration) = self.duration {
            let _ = self.deadline.set(started + duration);
        }
    }

    /// Stops handing out ids. Already claimed ids are unaffected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of ids handed out so far.
    pub fn claimed(&self) -> u64 {
        let raw = self.counter.load(Ordering::Relaxed);
        match self.requests {
            Some(total) => raw.min(total),
            None => raw,
        }
    }

    /// Claims the next 1-based request id, or `None` once the gate is exhausted.
    pub fn next(&self) -> Option<u64> {
        if self.is_closed() {
            return None;
        }

        // Hot path: avoid timekeeping entirely unless we're in duration mode.
        if self.duration.is_some() {
            let now = Instant::now();

            // Lazily start the clock from the first claim if the driver didn't.
            if self.deadline.get().is_none() {
                self.start_at(now);
            }

            if let Some(deadline) = self.deadline.get()
                && now >= *deadline
            {
                return None;
            }
        }

        let idx = self.counter.fetch_add(1, Ordering::Relaxed);
        match self.requests {
            Some(total) if idx >= total => None,
            // Neither a request budget nor a duration => run once.
            None if self.duration.is_none() && idx > 0 => None,
            _ => Some(idx + 1),
        }
    }
}
