//! Cache Statistics Module
//!
//! Tracks cache performance metrics: hits, misses, writes, deletions,
//! evictions and expirations.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
///
/// All counters accumulate monotonically until [`CacheStats::reset`], except
/// `current_size` and `total_memory_used`, which mirror live store state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of lookups (hits + misses)
    pub total_requests: u64,
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    /// Number of entries removed by the eviction policy or file cap
    pub evictions: u64,
    /// Number of entries removed because their TTL elapsed
    pub expirations: u64,
    /// Current number of entries in the cache
    pub current_size: usize,
    /// Configured capacity
    pub max_size: usize,
    /// Approximate bytes held by live entries
    pub total_memory_used: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ..Self::default()
        }
    }

    // == Rates ==
    /// Returns hits / total_requests, or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.total_requests)
    }

    /// Returns misses / total_requests, or 0.0 if no requests have been made.
    pub fn miss_rate(&self) -> f64 {
        ratio(self.misses, self.total_requests)
    }

    /// Returns current_size / max_size, or 0.0 for a zero-capacity store.
    pub fn fill_rate(&self) -> f64 {
        ratio(self.current_size as u64, self.max_size as u64)
    }

    // == Recorders ==
    pub fn record_hit(&mut self) {
        self.total_requests += 1;
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.total_requests += 1;
        self.misses += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_delete(&mut self) {
        self.deletes += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    // == Live State ==
    /// Updates the live size figures.
    pub fn set_current_size(&mut self, entries: usize, memory: usize) {
        self.current_size = entries;
        self.total_memory_used = memory;
    }

    /// Takes back counters recorded by internal traffic. Live state and
    /// capacity are left alone.
    pub fn discount(&mut self, counted: &CacheStats) {
        self.total_requests = self.total_requests.saturating_sub(counted.total_requests);
        self.hits = self.hits.saturating_sub(counted.hits);
        self.misses = self.misses.saturating_sub(counted.misses);
        self.sets = self.sets.saturating_sub(counted.sets);
        self.deletes = self.deletes.saturating_sub(counted.deletes);
        self.evictions = self.evictions.saturating_sub(counted.evictions);
        self.expirations = self.expirations.saturating_sub(counted.expirations);
    }

    // == Reset ==
    /// Zeroes the accumulating counters, keeping live state and capacity.
    pub fn reset(&mut self) {
        *self = Self {
            current_size: self.current_size,
            max_size: self.max_size,
            total_memory_used: self.total_memory_used,
            ..Self::default()
        };
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new(10);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.current_size, 0);
        assert_eq!(stats.max_size, 10);
    }

    #[test]
    fn test_rates_no_requests() {
        let stats = CacheStats::new(0);
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.miss_rate(), 0.0);
        assert_eq!(stats.fill_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new(10);
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(stats.miss_rate(), 0.25);
    }

    #[test]
    fn test_fill_rate() {
        let mut stats = CacheStats::new(4);
        stats.set_current_size(1, 128);
        assert_eq!(stats.fill_rate(), 0.25);
        assert_eq!(stats.total_memory_used, 128);
    }

    #[test]
    fn test_reset_keeps_live_state() {
        let mut stats = CacheStats::new(8);
        stats.record_hit();
        stats.record_miss();
        stats.record_set();
        stats.record_delete();
        stats.record_eviction();
        stats.record_expiration();
        stats.set_current_size(3, 300);

        stats.reset();

        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.sets, 0);
        assert_eq!(stats.deletes, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 0);
        assert_eq!(stats.current_size, 3);
        assert_eq!(stats.total_memory_used, 300);
        assert_eq!(stats.max_size, 8);
    }

    #[test]
    fn test_discount_takes_back_counters() {
        let mut stats = CacheStats::new(8);
        stats.record_set();
        stats.record_set();
        stats.record_hit();
        stats.record_delete();
        stats.set_current_size(2, 64);

        let mut counted = CacheStats::default();
        counted.record_set();
        counted.record_hit();
        counted.record_delete();
        counted.record_delete();
        stats.discount(&counted);

        assert_eq!(stats.sets, 1);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.deletes, 0);
        assert_eq!(stats.current_size, 2);
        assert_eq!(stats.max_size, 8);
    }
}
