//! Buffer pool manager tests
//! Capacity limits, blocking hand-off, reference counting and cache tracking

use std::{
    sync::{mpsc, Arc},
    thread,
    time::{Duration, Instant},
};

use framebind::{
    buffers::{BlockSizePolicy, BufferPoolManager, CacheMode, PoolConfig, PoolConfigBuilder},
    FrameBindError,
};

#[cfg(test)]
mod buffer_pool_tests {
    use super::*;

    fn manager() -> Arc<BufferPoolManager> {
        Arc::new(BufferPoolManager::new(64 * 1024 * 1024, Duration::from_millis(10)))
    }

    /// Test: Ten blocks, the eleventh request fails, a blocked twelfth is served after a release
    #[test]
    fn test_exhaustion_and_blocking_handoff() {
        let manager = manager();
        let pool_id = manager
            .create_pool(PoolConfig::new("ten").with_fixed_size(4096).with_block_count(10))
            .unwrap();

        let mut held: Vec<_> = (0..10).map(|_| manager.get_block(pool_id, 4096, false).unwrap()).collect();

        match manager.get_block(pool_id, 4096, false) {
            Err(FrameBindError::Exhausted { capacity, .. }) => assert_eq!(capacity, 10),
            other => panic!("expected Exhausted, got {:?}", other),
        }

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let manager = manager.clone();
            thread::spawn(move || {
                let buffer = manager.get_block(pool_id, 4096, true);
                tx.send(()).unwrap();
                buffer
            })
        };

        // Still blocked while every block is held
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        let released = held.pop().unwrap();
        manager.release_block(released).unwrap();

        rx.recv_timeout(Duration::from_secs(2)).expect("waiter was not woken");
        let buffer = waiter.join().unwrap().unwrap();
        assert_eq!(buffer.capacity(), 4096);

        let stats = manager.pool_stats(pool_id).unwrap();
        assert_eq!(stats.currently_in_use, 10);
        assert_eq!(stats.exhausted_failures, 1);
    }

    /// Test: Ten blocks, the eleventh request fails, a non-blocking twelfth succeeds after a release
    #[test]
    fn test_exhaustion_then_nonblocking_retry() {
        let manager = manager();
        let pool_id = manager
            .create_pool(PoolConfig::new("retry").with_fixed_size(4096).with_block_count(10))
            .unwrap();

        let mut held: Vec<_> = (0..10).map(|_| manager.get_block(pool_id, 4096, false).unwrap()).collect();
        assert!(matches!(
            manager.get_block(pool_id, 4096, false),
            Err(FrameBindError::Exhausted { .. })
        ));

        let released = held.pop().unwrap();
        let released_index = released.handle().index;
        manager.release_block(released).unwrap();

        let twelfth = manager.get_block(pool_id, 4096, false).unwrap();
        assert_eq!(twelfth.handle().index, released_index);
        assert_eq!(twelfth.capacity(), 4096);

        let stats = manager.pool_stats(pool_id).unwrap();
        assert_eq!(stats.currently_in_use, 10);
        assert_eq!(stats.exhausted_failures, 1);
    }

    /// Test: Outstanding blocks never overlap in memory
    #[test]
    fn test_blocks_are_disjoint() {
        let manager = manager();
        let pool_id = manager
            .create_pool(PoolConfig::new("disjoint").with_max_size(1000).with_block_count(8))
            .unwrap();

        let mut buffers: Vec<_> = (1..=8)
            .map(|i| manager.get_block(pool_id, i * 100, false).unwrap())
            .collect();

        for (i, buffer) in buffers.iter_mut().enumerate() {
            buffer.fill(i as u8 + 1).unwrap();
        }

        let mut ranges: Vec<(usize, usize)> = buffers
            .iter()
            .map(|b| (b.as_ptr() as usize, b.as_ptr() as usize + b.capacity()))
            .collect();
        ranges.sort();
        for pair in ranges.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "blocks overlap: {:?}", pair);
        }

        // Each fill landed only in its own block
        for (i, buffer) in buffers.iter().enumerate() {
            assert_eq!(buffer.len(), (i + 1) * 100);
            assert!(buffer.as_slice().iter().all(|&b| b == i as u8 + 1));
        }
    }

    /// Test: Fixed-size pools hand out full blocks; oversized requests are refused
    #[test]
    fn test_size_policies() {
        let manager = manager();
        let fixed = manager
            .create_pool(PoolConfig::new("fixed").with_fixed_size(2048).with_block_count(2))
            .unwrap();
        assert_eq!(manager.get_block(fixed, 10, false).unwrap().len(), 2048);
        assert!(matches!(
            manager.get_block(fixed, 4096, false),
            Err(FrameBindError::InvalidArgument { .. })
        ));

        let capped = manager
            .create_pool(PoolConfig::new("capped").with_max_size(2048).with_block_count(2))
            .unwrap();
        assert_eq!(manager.get_block(capped, 10, false).unwrap().len(), 10);
        assert!(matches!(
            manager.get_block(capped, 0, false),
            Err(FrameBindError::InvalidArgument { .. })
        ));
        assert_eq!(
            manager.pool(capped).unwrap().config().block_size,
            BlockSizePolicy::UpTo(2048)
        );
    }

    /// Test: Releasing a bare handle twice is detected
    #[test]
    fn test_double_free_detection() {
        let manager = manager();
        let pool_id = manager
            .create_pool(PoolConfig::new("double").with_fixed_size(256).with_block_count(1))
            .unwrap();

        let handle = manager.get_block(pool_id, 256, false).unwrap().into_raw();
        manager.release_raw(handle).unwrap();

        match manager.release_raw(handle) {
            Err(FrameBindError::DoubleFree { block, .. }) => assert_eq!(block, handle.index as usize),
            other => panic!("expected DoubleFree, got {:?}", other),
        }

        // A recycled block carries a new generation, so the old handle stays stale
        let again = manager.get_block(pool_id, 256, false).unwrap();
        assert_eq!(again.handle().index, handle.index);
        assert_ne!(again.handle().generation, handle.generation);
        assert!(manager.release_raw(handle).is_err());
        assert_eq!(again.refcount(), 1);
    }

    /// Test: Releasing a shared handle twice cannot drop the owning buffer's reference
    #[test]
    fn test_double_raw_release_keeps_owner_alive() {
        let manager = manager();
        let pool_id = manager
            .create_pool(PoolConfig::new("owner").with_fixed_size(256).with_block_count(1))
            .unwrap();

        let mut a = manager.get_block(pool_id, 256, false).unwrap();
        a.fill(0x3c).unwrap();
        let h = a.share_raw().unwrap();

        manager.release_raw(h).unwrap();
        match manager.release_raw(h) {
            Err(FrameBindError::DoubleFree { block, .. }) => assert_eq!(block, h.index as usize),
            other => panic!("expected DoubleFree, got {:?}", other),
        }

        // The only block is still owned by `a`
        assert_eq!(a.refcount(), 1);
        assert!(matches!(
            manager.get_block(pool_id, 256, false),
            Err(FrameBindError::Exhausted { .. })
        ));
        assert!(a.as_slice().iter().all(|&b| b == 0x3c));
        assert!(a.fill(0x11).is_ok());

        drop(a);
        assert_eq!(manager.pool(pool_id).unwrap().available_count(), 1);
    }

    /// Test: Shared references keep the block out of the free list
    #[test]
    fn test_shared_references() {
        let manager = manager();
        let pool_id = manager
            .create_pool(PoolConfig::new("shared").with_fixed_size(128).with_block_count(1))
            .unwrap();
        let pool = manager.pool(pool_id).unwrap();

        let mut buffer = manager.get_block(pool_id, 128, false).unwrap();
        buffer.fill(0x5a).unwrap();

        let copy = buffer.try_clone().unwrap();
        let raw = buffer.share_raw().unwrap();
        assert_eq!(buffer.refcount(), 3);

        // Writes need exclusive ownership
        assert!(buffer.fill(0).is_err());
        assert_eq!(copy.as_slice()[0], 0x5a);

        drop(copy);
        pool.release_raw(raw).unwrap();
        assert_eq!(buffer.refcount(), 1);
        assert_eq!(pool.available_count(), 0);

        buffer.release().unwrap();
        assert_eq!(pool.available_count(), 1);
    }

    /// Test: Cached blocks turn dirty on write and clean on flush
    #[test]
    fn test_cache_tracking() {
        let manager = manager();
        let pool_id = manager
            .create_pool(
                PoolConfigBuilder::new("cached")
                    .fixed_size(512)
                    .block_count(2)
                    .cached()
                    .build(manager.ceiling())
                    .unwrap(),
            )
            .unwrap();

        let mut buffer = manager.get_block(pool_id, 512, false).unwrap();
        assert_eq!(buffer.cache_mode(), CacheMode::Cached);
        assert!(!buffer.is_dirty());

        buffer.write(0, b"pixels").unwrap();
        assert!(buffer.is_dirty());

        manager.flush_cache(&buffer, true).unwrap();
        assert!(!buffer.is_dirty());

        buffer.fill(0xff).unwrap();
        assert!(buffer.is_dirty());
        manager.flush_cache(&buffer, false).unwrap();
        assert!(!buffer.is_dirty());

        let stats = manager.pool_stats(pool_id).unwrap();
        assert_eq!(stats.flushes, 1);
        assert_eq!(stats.invalidations, 1);
    }

    /// Test: Timed requests honor their bound
    #[test]
    fn test_timed_request_expires() {
        let manager = manager();
        let pool_id = manager
            .create_pool(PoolConfig::new("timed").with_fixed_size(64).with_block_count(1))
            .unwrap();
        let _held = manager.get_block(pool_id, 64, false).unwrap();

        let start = Instant::now();
        let result = manager.get_block_timeout(pool_id, 64, 30);
        assert!(matches!(result, Err(FrameBindError::Timeout { .. })));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    /// Test: Pools with outstanding blocks refuse destruction
    #[test]
    fn test_destroy_lifecycle() {
        let manager = manager();
        let pool_id = manager
            .create_pool(PoolConfig::new("short-lived").with_fixed_size(64).with_block_count(2))
            .unwrap();

        let buffer = manager.get_block(pool_id, 64, false).unwrap();
        assert!(matches!(manager.destroy_pool(pool_id), Err(FrameBindError::Busy { .. })));

        drop(buffer);
        manager.destroy_pool(pool_id).unwrap();
        assert!(matches!(manager.pool(pool_id), Err(FrameBindError::NotFound { .. })));
        assert!(matches!(manager.destroy_pool(pool_id), Err(FrameBindError::NotFound { .. })));
        assert_eq!(manager.lifetime_counts(), (1, 1));
    }

    /// Test: Anonymous mapped pools behave like heap pools
    #[cfg(feature = "mapped")]
    #[test]
    fn test_mapped_backing() {
        use framebind::buffers::{BackingType, BLOCK_ALIGNMENT};

        let manager = manager();
        let pool_id = manager
            .create_pool(
                PoolConfig::new("mapped")
                    .with_fixed_size(1000)
                    .with_block_count(4)
                    .with_backing(BackingType::Mapped),
            )
            .unwrap();

        let mut buffers: Vec<_> = (0..4).map(|_| manager.get_block(pool_id, 1000, false).unwrap()).collect();
        for (i, buffer) in buffers.iter_mut().enumerate() {
            assert_eq!(buffer.as_ptr() as usize % BLOCK_ALIGNMENT, 0);
            buffer.fill(i as u8).unwrap();
        }
        for (i, buffer) in buffers.iter().enumerate() {
            assert!(buffer.as_slice().iter().all(|&b| b == i as u8));
        }

        drop(buffers);
        manager.destroy_pool(pool_id).unwrap();
    }

    /// Test: Configurations above the ceiling are refused up front
    #[test]
    fn test_ceiling_enforced() {
        let manager = Arc::new(BufferPoolManager::new(1024 * 1024, Duration::from_millis(10)));
        let result = manager.create_pool(PoolConfig::new("huge").with_fixed_size(1024 * 1024).with_block_count(2));
        assert!(matches!(result, Err(FrameBindError::InvalidArgument { .. })));
        assert_eq!(manager.pool_count(), 0);
    }
}
