//! Rolling latency telemetry over delivered results.

use std::time::{Duration, Instant};

/// Rolling view of per-frame latency, updated once per delivered result
/// with (now − start timestamp).
#[derive(Debug)]
pub(crate) struct LatencyMetrics {
    delivered: u64,
    total: Duration,
    last: Duration,
}

impl LatencyMetrics {
    pub(crate) fn new() -> Self {
        Self {
            delivered: 0,
            total: Duration::ZERO,
            last: Duration::ZERO,
        }
    }

    /// Fold one delivered frame, keyed on its submission timestamp.
    pub(crate) fn update(&mut self, started: Instant) {
        self.last = started.elapsed();
        self.total += self.last;
        self.delivered += 1;
    }

    pub(crate) fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            delivered: self.delivered,
            average: if self.delivered == 0 {
                Duration::ZERO
            } else {
                self.total / u32::try_from(self.delivered).unwrap_or(u32::MAX)
            },
            last: self.last,
        }
    }
}

/// Snapshot of delivered-frame latency telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySnapshot {
    /// Number of frames delivered so far.
    pub delivered: u64,
    /// Mean submit-to-consume latency over all delivered frames.
    pub average: Duration,
    /// Latency of the most recently delivered frame.
    pub last: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn empty_snapshot_is_zero() {
        let snap = LatencyMetrics::new().snapshot();
        assert_eq!(snap.delivered, 0);
        assert_eq!(snap.average, Duration::ZERO);
        assert_eq!(snap.last, Duration::ZERO);
    }

    #[test]
    fn update_accumulates() {
        let mut metrics = LatencyMetrics::new();
        let start = Instant::now();
        thread::sleep(Duration::from_millis(5));
        metrics.update(start);
        metrics.update(start);

        let snap = metrics.snapshot();
        assert_eq!(snap.delivered, 2);
        assert!(snap.average >= Duration::from_millis(5));
        assert!(snap.last >= snap.average);
    }
}
