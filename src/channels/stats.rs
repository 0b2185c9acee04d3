//! Per-channel frame counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a channel's counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Frames enqueued into this channel's queue
    pub frames_accepted: u64,
    /// Frames handed out by `get_frame`
    pub frames_delivered: u64,
    /// Frames returned through `release_frame`
    pub frames_released: u64,
    /// Sends from this channel that were refused
    pub frames_rejected: u64,
    /// Queued frames dropped on destroy
    pub frames_discarded: u64,
}

impl ChannelStats {
    /// Frames delivered but not yet released
    pub fn outstanding(&self) -> u64 {
        self.frames_delivered.saturating_sub(self.frames_released)
    }
}

#[derive(Debug, Default)]
pub struct AtomicChannelStats {
    accepted: AtomicU64,
    delivered: AtomicU64,
    released: AtomicU64,
    rejected: AtomicU64,
    discarded: AtomicU64,
}

impl AtomicChannelStats {
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: usize) {
        self.discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ChannelStats {
        ChannelStats {
            frames_accepted: self.accepted.load(Ordering::Relaxed),
            frames_delivered: self.delivered.load(Ordering::Relaxed),
            frames_released: self.released.load(Ordering::Relaxed),
            frames_rejected: self.rejected.load(Ordering::Relaxed),
            frames_discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}
