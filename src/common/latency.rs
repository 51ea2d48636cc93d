//! Goal-to-order latency tracking
//!
//! Each pipeline that reaches order submission records how long it took from
//! goal detection to the submit call. The tracker keeps a window of the most
//! recent samples so a summary can be logged periodically and at shutdown.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

/// Latency between a goal's detection timestamp and now
///
/// Clock skew that would make the value negative is clamped to zero.
pub fn since_detection(detected_at: DateTime<Utc>) -> Duration {
    (Utc::now() - detected_at).to_std().unwrap_or_default()
}

/// Summary over the recorded samples
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyStats {
    pub samples: usize,
    pub average: Duration,
    pub min: Duration,
    pub max: Duration,
    pub median: Duration,
    pub p95: Duration,
}

impl fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} samples, avg {:?}, min {:?}, median {:?}, p95 {:?}, max {:?}",
            self.samples, self.average, self.min, self.median, self.p95, self.max
        )
    }
}

/// Samples kept by [`LatencyTracker::new`]
pub const DEFAULT_LATENCY_WINDOW: usize = 1024;

/// Thread-safe collector of recent goal-to-submit latencies
#[derive(Debug)]
pub struct LatencyTracker {
    capacity: usize,
    samples: Mutex<VecDeque<Duration>>,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LATENCY_WINDOW)
    }
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker that keeps at most `capacity` samples, dropping the oldest
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, latency: Duration) {
        if let Ok(mut samples) = self.samples.lock() {
            if samples.len() == self.capacity {
                samples.pop_front();
            }
            samples.push_back(latency);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summary statistics, `None` until at least one sample exists
    pub fn stats(&self) -> Option<LatencyStats> {
        let mut durations: Vec<Duration> = self.samples.lock().ok()?.iter().copied().collect();
        if durations.is_empty() {
            return None;
        }
        durations.sort();

        let samples = durations.len();
        let total_nanos: u128 = durations.iter().map(|d| d.as_nanos()).sum();
        let p95_index = ((samples as f64 * 0.95) as usize).min(samples - 1);

        Some(LatencyStats {
            samples,
            average: Duration::from_nanos((total_nanos / samples as u128) as u64),
            min: durations[0],
            max: durations[samples - 1],
            median: durations[samples / 2],
            p95: durations[p95_index],
        })
    }
}
