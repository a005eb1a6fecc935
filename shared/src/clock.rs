//! Time sources and round-trip delay estimation
//!
//! All timing-sensitive code reads time through the [`Clock`] trait so that
//! fixed-interval logic can be driven by a [`ManualClock`] in tests. The
//! [`DelayEstimator`] is purely advisory: its value is shown to players and
//! logged, and never feeds back into admission or simulation.

use crate::DELAY_SAMPLE_WINDOW;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of wall-clock milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Reads the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis() as u64
    }
}

/// Clock advanced by hand, shared between clones
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Rolling average of echo delays over a fixed number of samples
#[derive(Debug, Clone)]
pub struct DelayEstimator {
    samples: VecDeque<u64>,
    window: usize,
    sum: u64,
}

impl Default for DelayEstimator {
    fn default() -> Self {
        Self::new(DELAY_SAMPLE_WINDOW)
    }
}

impl DelayEstimator {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
            sum: 0,
        }
    }

    /// Records the echo of a timestamp we sent earlier and returns the new sample.
    ///
    /// An echo from the future (clock went backwards) counts as zero delay.
    pub fn record_echo(&mut self, echoed_client_millis: u64, now_millis: u64) -> u64 {
        let delay = now_millis.saturating_sub(echoed_client_millis);
        if self.samples.len() == self.window {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= oldest;
            }
        }
        self.samples.push_back(delay);
        self.sum += delay;
        delay
    }

    /// Average delay in whole milliseconds, rounded up; 0 before any sample
    pub fn average_millis(&self) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let count = self.samples.len() as u64;
        (self.sum + count - 1) / count
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}
