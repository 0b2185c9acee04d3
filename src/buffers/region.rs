//! Backing memory for a block pool

use std::{
    alloc::{self, Layout},
    ptr::NonNull,
};

use crate::error::{FrameBindError, Result};

use super::config::BackingType;

/// Block alignment inside a region
pub const BLOCK_ALIGNMENT: usize = 64;

/// One contiguous allocation carved into equally sized block slots
///
/// Block memory is only reached through `base`; no Rust reference to the
/// whole allocation is kept while blocks are handed out.
#[derive(Debug)]
pub(crate) struct PoolRegion {
    storage: Storage,
    base: NonNull<u8>,
    stride: usize,
    block_count: usize,
}

#[derive(Debug)]
enum Storage {
    /// Owned through `base`; freed in `Drop`
    Heap(Layout),
    #[cfg(feature = "mapped")]
    Mapped(#[allow(dead_code)] memmap2::MmapMut),
}

impl PoolRegion {
    /// Allocate `block_count` slots of at least `block_size` bytes each
    pub(crate) fn new(backing: BackingType, block_size: usize, block_count: usize) -> Result<Self> {
        let stride = align_up(block_size, BLOCK_ALIGNMENT);
        let total = stride.checked_mul(block_count).ok_or_else(|| {
            FrameBindError::invalid_argument("block_count", "Pool size overflows usize")
        })?;

        let (storage, base) = match backing {
            BackingType::Heap => {
                if total == 0 {
                    return Err(FrameBindError::invalid_argument("block_count", "Pool size cannot be zero"));
                }
                let layout = Layout::from_size_align(total, BLOCK_ALIGNMENT).map_err(|_| {
                    FrameBindError::invalid_argument("block_count", "Pool size exceeds allocation limits")
                })?;
                // SAFETY: layout has a non-zero size
                let base = NonNull::new(unsafe { alloc::alloc_zeroed(layout) }).ok_or_else(|| {
                    FrameBindError::invalid_argument("block_size", "Heap allocation failed")
                })?;
                (Storage::Heap(layout), base)
            }
            #[cfg(feature = "mapped")]
            BackingType::Mapped => {
                let mut mmap = memmap2::MmapMut::map_anon(total)
                    .map_err(|e| FrameBindError::from_io(e, "Failed to map pool region"))?;
                let base = NonNull::new(mmap.as_mut_ptr()).ok_or_else(|| {
                    FrameBindError::invalid_argument("block_size", "Invalid mapping")
                })?;
                (Storage::Mapped(mmap), base)
            }
        };

        Ok(Self {
            storage,
            base,
            stride,
            block_count,
        })
    }

    /// Pointer to the first byte of slot `index`
    pub(crate) fn block_ptr(&self, index: usize) -> *mut u8 {
        debug_assert!(index < self.block_count);
        // SAFETY: index < block_count keeps the offset inside the allocation
        unsafe { self.base.as_ptr().add(index * self.stride) }
    }

    pub(crate) fn stride(&self) -> usize {
        self.stride
    }

    pub(crate) fn total_size(&self) -> usize {
        self.stride * self.block_count
    }

    pub(crate) fn backing(&self) -> BackingType {
        match self.storage {
            Storage::Heap(_) => BackingType::Heap,
            #[cfg(feature = "mapped")]
            Storage::Mapped(_) => BackingType::Mapped,
        }
    }
}

impl Drop for PoolRegion {
    fn drop(&mut self) {
        if let Storage::Heap(layout) = self.storage {
            // SAFETY: base came from alloc_zeroed with this layout and is freed once
            unsafe { alloc::dealloc(self.base.as_ptr(), layout) }
        }
    }
}

// The region is only ever accessed through per-block ownership enforced by the pool.
unsafe impl Send for PoolRegion {}
unsafe impl Sync for PoolRegion {}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_do_not_overlap() {
        let region = PoolRegion::new(BackingType::Heap, 100, 4).unwrap();
        assert_eq!(region.stride(), 128);
        assert_eq!(region.total_size(), 512);

        for i in 1..4 {
            let prev = region.block_ptr(i - 1) as usize;
            let cur = region.block_ptr(i) as usize;
            assert!(cur >= prev + 100);
        }
    }

    #[test]
    fn test_heap_region_write_and_drop() {
        let region = PoolRegion::new(BackingType::Heap, 1000, 3).unwrap();
        assert_eq!(region.backing(), BackingType::Heap);
        for i in 0..3 {
            let ptr = region.block_ptr(i);
            assert_eq!(ptr as usize % BLOCK_ALIGNMENT, 0);
            // SAFETY: each slot is at least 1000 bytes and not shared here
            unsafe {
                assert_eq!(*ptr, 0);
                std::ptr::write_bytes(ptr, i as u8 + 1, 1000);
            }
        }
        for i in 0..3 {
            // SAFETY: as above
            let slot = unsafe { std::slice::from_raw_parts(region.block_ptr(i), 1000) };
            assert!(slot.iter().all(|&b| b == i as u8 + 1));
        }
        drop(region);

        assert!(PoolRegion::new(BackingType::Heap, 64, 0).is_err());
    }

    #[cfg(feature = "mapped")]
    #[test]
    fn test_mapped_region() {
        let region = PoolRegion::new(BackingType::Mapped, 4096, 2).unwrap();
        assert_eq!(region.backing(), BackingType::Mapped);
        assert_eq!(region.block_ptr(0) as usize % BLOCK_ALIGNMENT, 0);
    }
}
