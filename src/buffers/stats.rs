//! Block pool statistics tracking

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Snapshot of a pool's counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Blocks owned by the pool
    pub total_blocks: usize,
    /// Blocks currently held by a pipeline stage
    pub currently_in_use: usize,
    /// Peak number of blocks in use simultaneously
    pub peak_usage: usize,
    /// Successful `get_block` calls
    pub total_allocations: u64,
    /// Blocks returned to the free list
    pub total_releases: u64,
    /// Non-blocking requests refused with `Exhausted`
    pub exhausted_failures: u64,
    /// Requests that had to wait for a release
    pub blocked_waits: u64,
    /// Flushes for reader visibility
    pub flushes: u64,
    /// Invalidations before producer writes
    pub invalidations: u64,
}

impl PoolStats {
    /// Calculate pool utilization (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.total_blocks == 0 {
            return 0.0;
        }
        self.currently_in_use as f64 / self.total_blocks as f64
    }

    /// Get a summary string of the statistics
    pub fn summary(&self) -> String {
        format!(
            "PoolStats {{ blocks: {}, in_use: {}, peak: {}, allocations: {}, \
             releases: {}, exhausted: {}, waits: {}, utilization: {:.2}% }}",
            self.total_blocks,
            self.currently_in_use,
            self.peak_usage,
            self.total_allocations,
            self.total_releases,
            self.exhausted_failures,
            self.blocked_waits,
            self.utilization() * 100.0
        )
    }
}

/// Thread-safe counters behind [`PoolStats`]
#[derive(Debug, Default)]
pub struct AtomicPoolStats {
    total_blocks: AtomicUsize,
    currently_in_use: AtomicUsize,
    peak_usage: AtomicUsize,
    total_allocations: AtomicU64,
    total_releases: AtomicU64,
    exhausted_failures: AtomicU64,
    blocked_waits: AtomicU64,
    flushes: AtomicU64,
    invalidations: AtomicU64,
}

impl AtomicPoolStats {
    pub fn new(total_blocks: usize) -> Self {
        let stats = Self::default();
        stats.total_blocks.store(total_blocks, Ordering::Relaxed);
        stats
    }

    /// Record a successful allocation
    pub fn record_allocation(&self) {
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        let in_use = self.currently_in_use.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_usage.fetch_max(in_use, Ordering::Relaxed);
    }

    /// Record a block going back to the free list
    pub fn record_release(&self) {
        self.total_releases.fetch_add(1, Ordering::Relaxed);
        self.currently_in_use.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_exhausted(&self) {
        self.exhausted_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wait(&self) {
        self.blocked_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, for_reader: bool) {
        if for_reader {
            self.flushes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            total_blocks: self.total_blocks.load(Ordering::Relaxed),
            currently_in_use: self.currently_in_use.load(Ordering::Relaxed),
            peak_usage: self.peak_usage.load(Ordering::Relaxed),
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            total_releases: self.total_releases.load(Ordering::Relaxed),
            exhausted_failures: self.exhausted_failures.load(Ordering::Relaxed),
            blocked_waits: self.blocked_waits.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_tracking() {
        let stats = AtomicPoolStats::new(4);
        stats.record_allocation();
        stats.record_allocation();
        stats.record_release();
        stats.record_allocation();

        let snap = stats.snapshot();
        assert_eq!(snap.currently_in_use, 2);
        assert_eq!(snap.peak_usage, 2);
        assert_eq!(snap.total_allocations, 3);
        assert_eq!(snap.total_releases, 1);
        assert!((snap.utilization() - 0.5).abs() < f64::EPSILON);
    }
}
