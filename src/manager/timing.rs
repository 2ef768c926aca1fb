//! Latency sampling for manager operations.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

/// Summary of the most recent operation latencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    /// Number of samples currently held
    pub samples: usize,
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    /// Operations per second of time spent inside the cache
    pub throughput: f64,
}

/// Fixed-capacity ring buffer of operation durations. The oldest sample is
/// dropped once the buffer is full.
#[derive(Debug)]
pub struct LatencyTracker {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl LatencyTracker {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn summary(&self) -> PerformanceStats {
        let (Some(min), Some(max)) = (self.samples.iter().min(), self.samples.iter().max()) else {
            return PerformanceStats::default();
        };

        let total: Duration = self.samples.iter().sum();
        let count = self.samples.len();
        let total_secs = total.as_secs_f64();

        PerformanceStats {
            samples: count,
            min_ms: as_millis(*min),
            avg_ms: as_millis(total) / count as f64,
            max_ms: as_millis(*max),
            throughput: if total_secs > 0.0 {
                count as f64 / total_secs
            } else {
                0.0
            },
        }
    }
}

fn as_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
