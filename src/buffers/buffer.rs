//! Owned handle to one pool block

use std::{fmt, slice, sync::Arc};

use log::warn;

use crate::error::{FrameBindError, Result};

use super::{
    config::CacheMode,
    pool::{BlockHandle, PoolId, PoolInner},
};

/// A reference-counted pool block
///
/// A `Buffer` is one reference. Moving it moves ownership; dropping it
/// releases the reference. Mutable access needs the reference to be the only
/// one, so two holders never see the bytes change under them.
pub struct Buffer {
    pool: Arc<PoolInner>,
    handle: BlockHandle,
    len: usize,
    armed: bool,
}

impl Buffer {
    pub(crate) fn new(pool: Arc<PoolInner>, handle: BlockHandle, len: usize) -> Self {
        Self {
            pool,
            handle,
            len,
            armed: true,
        }
    }

    /// Index-based handle of the underlying block
    pub fn handle(&self) -> BlockHandle {
        self.handle
    }

    pub fn pool_id(&self) -> PoolId {
        self.pool.id()
    }

    /// Number of valid bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes the block can hold
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Shrink or grow the valid length within capacity
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if len > self.capacity() {
            return Err(FrameBindError::invalid_argument(
                "len",
                format!("Length {} exceeds block capacity {}", len, self.capacity()),
            ));
        }
        self.len = len;
        Ok(())
    }

    /// Start address of the block, for disjointness checks
    pub fn as_ptr(&self) -> *const u8 {
        self.pool.block_ptr(self.handle)
    }

    /// Read-only view of the valid bytes
    pub fn as_slice(&self) -> &[u8] {
        if !self.pool.is_live(self.handle) {
            return &[];
        }
        // SAFETY: the block stays reserved while this reference is alive and
        // writers need the refcount to be 1, which excludes other readers.
        unsafe { slice::from_raw_parts(self.pool.block_ptr(self.handle), self.len) }
    }

    /// Writable view of the valid bytes; fails `Busy` while the block is shared
    ///
    /// On a cached pool this marks the block dirty until the next flush.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        self.writable(self.len)
    }

    fn writable(&mut self, len: usize) -> Result<&mut [u8]> {
        let refs = self.pool.refcount(self.handle);
        if refs != 1 {
            return Err(FrameBindError::busy(format!(
                "block {} is shared by {} references",
                self.handle, refs
            )));
        }
        self.pool.mark_dirty(self.handle);
        // SAFETY: sole reference, and `&mut self` blocks new shares while borrowed
        Ok(unsafe { slice::from_raw_parts_mut(self.pool.block_ptr(self.handle), len) })
    }

    /// Copy `data` in at `offset`, extending the valid length if needed
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len()).unwrap_or(usize::MAX);
        if end > self.capacity() {
            return Err(FrameBindError::invalid_argument(
                "data",
                format!("Write of {} bytes at {} exceeds capacity {}", data.len(), offset, self.capacity()),
            ));
        }
        let new_len = end.max(self.len);
        self.writable(new_len)?[offset..end].copy_from_slice(data);
        self.len = new_len;
        Ok(())
    }

    /// Fill every valid byte with `value`
    pub fn fill(&mut self, value: u8) -> Result<()> {
        self.as_mut_slice()?.fill(value);
        Ok(())
    }

    /// Whether the block was written since its last flush (cached pools only)
    pub fn is_dirty(&self) -> bool {
        self.pool.cache_mode() == CacheMode::Cached && self.pool.is_dirty(self.handle)
    }

    pub fn cache_mode(&self) -> CacheMode {
        self.pool.cache_mode()
    }

    /// Current reference count of the block
    pub fn refcount(&self) -> u32 {
        self.pool.refcount(self.handle)
    }

    /// Add a reference and return it as a second read-only `Buffer`
    pub fn try_clone(&self) -> Result<Buffer> {
        self.pool.add_ref(self.handle)?;
        Ok(Buffer::new(Arc::clone(&self.pool), self.handle, self.len))
    }

    /// Add a reference tracked only by its handle; drop it with `release_raw`
    pub fn share_raw(&self) -> Result<BlockHandle> {
        self.pool.add_raw_ref(self.handle)?;
        Ok(self.handle)
    }

    /// Give up the RAII guard and keep the reference as a bare handle
    pub fn into_raw(mut self) -> BlockHandle {
        self.armed = false;
        if let Err(e) = self.pool.convert_to_raw(self.handle) {
            warn!("Block {} has no reference left to hand out: {}", self.handle, e);
        }
        self.handle
    }

    pub(crate) fn flush(&self, for_reader: bool) -> Result<()> {
        self.pool.flush(self.handle, for_reader)
    }

    /// Release this reference, reporting refcount errors instead of logging them
    pub fn release(mut self) -> Result<()> {
        self.armed = false;
        self.pool.release(self.handle)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.pool.release(self.handle) {
                warn!("Failed to release block {}: {}", self.handle, e);
            }
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("handle", &self.handle)
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
