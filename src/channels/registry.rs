//! Channel registry and lifecycle enforcement

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use log::{debug, info};

use crate::{
    bind::{self, BindGraph},
    error::{FrameBindError, Result},
};

use super::{
    attr::ChannelAttr,
    id::ChannelId,
    queue::FrameQueue,
    state::ChannelState,
    stats::{AtomicChannelStats, ChannelStats},
};

/// One registered channel
#[derive(Debug)]
pub(crate) struct ChannelEntry {
    pub(crate) id: ChannelId,
    pub(crate) attr: ChannelAttr,
    state: Mutex<ChannelState>,
    pub(crate) queue: FrameQueue,
    pub(crate) stats: AtomicChannelStats,
}

impl ChannelEntry {
    fn lock_state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ChannelState {
        *self.lock_state()
    }

    /// Move to `next` if the current state is its predecessor
    ///
    /// `apply` runs after the state check; if it fails the state is left as is.
    fn transition(&self, next: ChannelState, apply: impl FnOnce(&FrameQueue) -> Result<()>) -> Result<()> {
        let mut state = self.lock_state();
        if !state.can_transition_to(next) {
            return Err(FrameBindError::illegal_state(
                self.id,
                format!("Cannot move from {} to {}", *state, next),
            ));
        }
        apply(&self.queue)?;
        *state = next;
        Ok(())
    }
}

/// Tracks every configured channel and owns their inbound queues
#[derive(Debug)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<ChannelId, Arc<ChannelEntry>>>,
    default_depth: usize,
}

impl ChannelRegistry {
    pub fn new(default_depth: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            default_depth,
        }
    }

    pub(crate) fn entry(&self, id: ChannelId) -> Result<Arc<ChannelEntry>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| FrameBindError::illegal_state(id, "Channel has not been created"))
    }

    /// Unconfigured → Created
    pub fn create(&self, id: ChannelId, attr: ChannelAttr) -> Result<()> {
        attr.validate(id.kind)?;

        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        if channels.contains_key(&id) {
            return Err(FrameBindError::duplicate_channel(id));
        }

        let depth = attr.depth().unwrap_or(self.default_depth);
        let entry = ChannelEntry {
            id,
            attr,
            state: Mutex::new(ChannelState::Created),
            queue: FrameQueue::new(id, depth),
            stats: AtomicChannelStats::default(),
        };
        channels.insert(id, Arc::new(entry));

        info!("Created channel {} (depth {})", id, depth);
        Ok(())
    }

    /// Created → Started; a non-negative `max_frames` caps how many frames it accepts
    pub fn start_receiving(&self, id: ChannelId, max_frames: i32) -> Result<()> {
        let budget = if max_frames < 0 { None } else { Some(max_frames as u64) };

        self.entry(id)?.transition(ChannelState::Started, |queue| {
            if max_frames == 0 {
                return Err(FrameBindError::invalid_argument(
                    "max_frames",
                    "Use -1 for an unbounded channel or a positive frame count",
                ));
            }
            queue.open(budget);
            Ok(())
        })?;

        info!("Started channel {} (budget {:?})", id, budget);
        Ok(())
    }

    /// Started → Stopped; queued frames stay readable
    pub fn stop_receiving(&self, id: ChannelId) -> Result<()> {
        self.entry(id)?.transition(ChannelState::Stopped, |queue| {
            queue.close();
            Ok(())
        })?;

        info!("Stopped channel {}", id);
        Ok(())
    }

    /// Stopped → Destroyed; `Busy` while any edge touches the channel
    ///
    /// Queued frames are dropped, returning their blocks to their pools, and
    /// the id becomes available for `create` again.
    pub fn destroy(&self, id: ChannelId, graph: &BindGraph) -> Result<()> {
        let entry = {
            let edges = graph.read_edges();
            let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
            let entry = channels
                .get(&id)
                .cloned()
                .ok_or_else(|| FrameBindError::illegal_state(id, "Channel has not been created"))?;

            let state = entry.state();
            if !state.can_transition_to(ChannelState::Destroyed) {
                return Err(FrameBindError::illegal_state(
                    id,
                    format!("Cannot destroy a {} channel", state),
                ));
            }
            if bind::touches(&edges, id) {
                return Err(FrameBindError::busy(format!("channel {} is still bound", id)));
            }

            *entry.lock_state() = ChannelState::Destroyed;
            channels.remove(&id);
            entry
        };

        let discarded = entry.queue.drain();
        if !discarded.is_empty() {
            debug!("Channel {} dropped {} pending frames", id, discarded.len());
            entry.stats.record_discarded(discarded.len());
        }
        drop(discarded);

        info!("Destroyed channel {}", id);
        Ok(())
    }

    /// Current lifecycle state; `Unconfigured` for unknown ids
    pub fn state(&self, id: ChannelId) -> ChannelState {
        self.entry(id)
            .map(|e| e.state())
            .unwrap_or(ChannelState::Unconfigured)
    }

    pub fn attr(&self, id: ChannelId) -> Result<ChannelAttr> {
        Ok(self.entry(id)?.attr.clone())
    }

    pub fn stats(&self, id: ChannelId) -> Result<ChannelStats> {
        Ok(self.entry(id)?.stats.snapshot())
    }

    /// Frames waiting in `id`'s queue
    pub fn pending(&self, id: ChannelId) -> Result<usize> {
        Ok(self.entry(id)?.queue.len())
    }

    pub fn queue_depth(&self, id: ChannelId) -> Result<usize> {
        Ok(self.entry(id)?.queue.capacity())
    }

    /// Whether `id`'s queue is currently taking frames
    pub fn is_accepting(&self, id: ChannelId) -> bool {
        self.entry(id).map(|e| e.queue.is_open()).unwrap_or(false)
    }

    /// All registered channels with their states, sorted
    pub fn list(&self) -> Vec<(ChannelId, ChannelState)> {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<_> = channels.iter().map(|(id, e)| (*id, e.state())).collect();
        list.sort();
        list
    }

    pub fn channel_count(&self) -> usize {
        self.channels.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
