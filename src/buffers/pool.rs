//! Fixed-capacity block pool with reference-counted slots

use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::debug;

use crate::{
    error::{FrameBindError, Result},
    timeout::{Deadline, WaitMode},
};

use super::{
    buffer::Buffer,
    config::{CacheMode, PoolConfig},
    region::PoolRegion,
    stats::{AtomicPoolStats, PoolStats},
};

/// Unique identifier for block pools
pub type PoolId = u32;

/// Index-based reference to one block of one pool
///
/// The generation changes every time the block is recycled, so a handle kept
/// past its final release can never touch the block's next owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    pub pool: PoolId,
    pub index: u32,
    pub generation: u32,
}

impl fmt::Display for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.pool, self.index, self.generation)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Slot {
    refcount: u32,
    /// References held as bare handles; always <= refcount
    raw_refs: u32,
    generation: u32,
    dirty: bool,
}

#[derive(Debug)]
struct PoolState {
    slots: Vec<Slot>,
    free: VecDeque<usize>,
    /// Tickets of blocked requesters, served in arrival order
    waiters: VecDeque<u64>,
    next_ticket: u64,
    destroyed: bool,
}

/// Shared state of one pool; `Buffer`s keep it alive
#[derive(Debug)]
pub(crate) struct PoolInner {
    id: PoolId,
    config: PoolConfig,
    region: PoolRegion,
    state: Mutex<PoolState>,
    available: Condvar,
    poll_interval: Duration,
    stats: AtomicPoolStats,
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn id(&self) -> PoolId {
        self.id
    }

    pub(crate) fn cache_mode(&self) -> CacheMode {
        self.config.cache_mode
    }

    pub(crate) fn capacity(&self) -> usize {
        self.config.block_size.max_block_size()
    }

    pub(crate) fn block_ptr(&self, handle: BlockHandle) -> *mut u8 {
        self.region.block_ptr(handle.index as usize)
    }

    fn acquire(self: &Arc<Self>, requested: usize, mode: WaitMode) -> Result<Buffer> {
        let len = self.config.block_size.resolve(requested)?;
        let deadline = Deadline::new(mode);
        let mut state = self.lock();

        if state.destroyed {
            return Err(FrameBindError::not_found(format!("pool {}", self.id)));
        }

        if state.waiters.is_empty() {
            if let Some(index) = state.free.pop_front() {
                return Ok(self.issue(&mut state, index, len));
            }
        }

        if !mode.is_blocking() {
            self.stats.record_exhausted();
            return Err(FrameBindError::Exhausted {
                pool: self.id,
                capacity: self.config.block_count,
            });
        }

        self.stats.record_wait();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiters.push_back(ticket);

        loop {
            if state.destroyed {
                state.waiters.retain(|t| *t != ticket);
                return Err(FrameBindError::not_found(format!("pool {}", self.id)));
            }

            if state.waiters.front() == Some(&ticket) {
                if let Some(index) = state.free.pop_front() {
                    state.waiters.pop_front();
                    let buffer = self.issue(&mut state, index, len);
                    // The next waiter in line may be able to proceed as well
                    self.available.notify_all();
                    return Ok(buffer);
                }
            }

            let slice = match deadline.next_slice(self.poll_interval) {
                Some(slice) => slice,
                None => {
                    state.waiters.retain(|t| *t != ticket);
                    self.available.notify_all();
                    return Err(FrameBindError::timeout(
                        format!("get_block on pool {}", self.id),
                        deadline.mode().as_millis(),
                    ));
                }
            };

            state = self
                .available
                .wait_timeout(state, slice)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn issue(self: &Arc<Self>, state: &mut PoolState, index: usize, len: usize) -> Buffer {
        let slot = &mut state.slots[index];
        slot.refcount = 1;
        slot.raw_refs = 0;
        slot.dirty = false;
        self.stats.record_allocation();

        let handle = BlockHandle {
            pool: self.id,
            index: index as u32,
            generation: slot.generation,
        };
        Buffer::new(Arc::clone(self), handle, len)
    }

    fn slot_mut<'a>(&self, state: &'a mut PoolState, handle: BlockHandle) -> Result<&'a mut Slot> {
        let double_free = FrameBindError::DoubleFree {
            pool: self.id,
            block: handle.index as usize,
        };
        if handle.pool != self.id {
            return Err(FrameBindError::invalid_argument(
                "handle",
                format!("Block {} does not belong to pool {}", handle, self.id),
            ));
        }
        match state.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.refcount > 0 => Ok(slot),
            Some(_) => Err(double_free),
            None => Err(FrameBindError::invalid_argument(
                "handle",
                format!("Block index {} out of range", handle.index),
            )),
        }
    }

    /// Drop the reference owned by a `Buffer`; the last one recycles the block
    pub(crate) fn release(&self, handle: BlockHandle) -> Result<()> {
        let mut state = self.lock();
        let slot = self.slot_mut(&mut state, handle)?;
        if slot.refcount <= slot.raw_refs {
            return Err(FrameBindError::DoubleFree {
                pool: self.id,
                block: handle.index as usize,
            });
        }
        self.drop_ref(state, handle)
    }

    /// Drop a reference held as a bare handle
    ///
    /// Only references handed out by `share_raw` or `into_raw` can be dropped
    /// this way; the ones owned by live `Buffer`s are never touched.
    pub(crate) fn release_raw(&self, handle: BlockHandle) -> Result<()> {
        let mut state = self.lock();
        let slot = self.slot_mut(&mut state, handle)?;
        if slot.raw_refs == 0 {
            return Err(FrameBindError::DoubleFree {
                pool: self.id,
                block: handle.index as usize,
            });
        }
        slot.raw_refs -= 1;
        self.drop_ref(state, handle)
    }

    fn drop_ref(&self, mut state: MutexGuard<'_, PoolState>, handle: BlockHandle) -> Result<()> {
        let slot = self.slot_mut(&mut state, handle)?;
        slot.refcount -= 1;
        if slot.refcount > 0 {
            return Ok(());
        }

        // Recycled blocks are always invalidated for the next writer
        slot.raw_refs = 0;
        slot.dirty = false;
        slot.generation = slot.generation.wrapping_add(1);
        state.free.push_back(handle.index as usize);
        self.stats.record_release();
        drop(state);

        self.available.notify_all();
        Ok(())
    }

    pub(crate) fn add_ref(&self, handle: BlockHandle) -> Result<u32> {
        let mut state = self.lock();
        let slot = self.slot_mut(&mut state, handle)?;
        slot.refcount += 1;
        Ok(slot.refcount)
    }

    /// Add a reference that will be dropped through `release_raw`
    pub(crate) fn add_raw_ref(&self, handle: BlockHandle) -> Result<()> {
        let mut state = self.lock();
        let slot = self.slot_mut(&mut state, handle)?;
        slot.refcount += 1;
        slot.raw_refs += 1;
        Ok(())
    }

    /// Re-label one `Buffer`-owned reference as a bare-handle reference
    pub(crate) fn convert_to_raw(&self, handle: BlockHandle) -> Result<()> {
        let mut state = self.lock();
        let slot = self.slot_mut(&mut state, handle)?;
        if slot.refcount <= slot.raw_refs {
            return Err(FrameBindError::DoubleFree {
                pool: self.id,
                block: handle.index as usize,
            });
        }
        slot.raw_refs += 1;
        Ok(())
    }

    /// Whether `handle` still names the block's current, referenced generation
    pub(crate) fn is_live(&self, handle: BlockHandle) -> bool {
        let state = self.lock();
        matches!(
            state.slots.get(handle.index as usize),
            Some(slot) if slot.generation == handle.generation && slot.refcount > 0
        )
    }

    pub(crate) fn refcount(&self, handle: BlockHandle) -> u32 {
        let state = self.lock();
        match state.slots.get(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation => slot.refcount,
            _ => 0,
        }
    }

    pub(crate) fn mark_dirty(&self, handle: BlockHandle) {
        if self.config.cache_mode == CacheMode::Cached {
            let mut state = self.lock();
            if let Ok(slot) = self.slot_mut(&mut state, handle) {
                slot.dirty = true;
            }
        }
    }

    pub(crate) fn is_dirty(&self, handle: BlockHandle) -> bool {
        let state = self.lock();
        match state.slots.get(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation => slot.dirty,
            _ => false,
        }
    }

    pub(crate) fn flush(&self, handle: BlockHandle, for_reader: bool) -> Result<()> {
        let mut state = self.lock();
        let slot = self.slot_mut(&mut state, handle)?;
        slot.dirty = false;
        self.stats.record_flush(for_reader);
        Ok(())
    }

    fn destroy(&self) -> Result<()> {
        let mut state = self.lock();
        let outstanding = state.slots.iter().filter(|s| s.refcount > 0).count();
        if outstanding > 0 {
            return Err(FrameBindError::busy(format!(
                "pool {} has {} outstanding blocks",
                self.id, outstanding
            )));
        }
        state.destroyed = true;
        drop(state);
        self.available.notify_all();
        Ok(())
    }
}

/// A fixed-capacity source of reusable, reference-counted blocks
#[derive(Debug, Clone)]
pub struct BlockPool {
    inner: Arc<PoolInner>,
}

impl BlockPool {
    /// Create a pool; the caller has already validated `config`
    pub(crate) fn new(id: PoolId, config: PoolConfig, poll_interval: Duration) -> Result<Self> {
        let region = PoolRegion::new(
            config.backing,
            config.block_size.max_block_size(),
            config.block_count,
        )?;

        debug!(
            "pool {} '{}': {} blocks, stride {} bytes, {} backing, {:?}",
            id,
            config.name,
            config.block_count,
            region.stride(),
            region.backing().name(),
            config.cache_mode
        );

        let state = PoolState {
            slots: vec![Slot::default(); config.block_count],
            free: (0..config.block_count).collect(),
            waiters: VecDeque::new(),
            next_ticket: 0,
            destroyed: false,
        };

        Ok(Self {
            inner: Arc::new(PoolInner {
                id,
                stats: AtomicPoolStats::new(config.block_count),
                config,
                region,
                state: Mutex::new(state),
                available: Condvar::new(),
                poll_interval,
            }),
        })
    }

    pub fn id(&self) -> PoolId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Take a free block; waits for a release when `blocking`, else fails `Exhausted`
    pub fn get_block(&self, requested: usize, blocking: bool) -> Result<Buffer> {
        let mode = if blocking {
            WaitMode::Forever
        } else {
            WaitMode::NonBlocking
        };
        self.inner.acquire(requested, mode)
    }

    /// Take a free block, waiting at most `timeout_ms` (`Timeout` on expiry)
    pub fn get_block_timeout(&self, requested: usize, timeout_ms: i32) -> Result<Buffer> {
        self.inner.acquire(requested, WaitMode::from_millis(timeout_ms))
    }

    /// Drop a reference obtained through [`Buffer::into_raw`] or [`Buffer::share_raw`]
    pub fn release_raw(&self, handle: BlockHandle) -> Result<()> {
        self.inner.release_raw(handle)
    }

    /// Current reference count of `handle`, zero once it is stale
    pub fn refcount(&self, handle: BlockHandle) -> u32 {
        self.inner.refcount(handle)
    }

    pub fn available_count(&self) -> usize {
        self.inner.lock().free.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.inner.config.block_count - self.available_count()
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.stats.snapshot()
    }

    pub(crate) fn destroy(&self) -> Result<()> {
        self.inner.destroy()
    }
}
