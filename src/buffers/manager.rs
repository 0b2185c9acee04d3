//! Registry of block pools, addressed by `PoolId`

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, AtomicUsize, Ordering},
        PoisonError, RwLock,
    },
    time::Duration,
};

use log::info;

use crate::error::{FrameBindError, Result};

use super::{
    buffer::Buffer,
    config::PoolConfig,
    pool::{BlockHandle, BlockPool, PoolId},
    stats::PoolStats,
};

/// Creates, looks up and destroys block pools
#[derive(Debug)]
pub struct BufferPoolManager {
    pools: RwLock<HashMap<PoolId, BlockPool>>,
    next_pool_id: AtomicU32,
    ceiling: usize,
    poll_interval: Duration,
    pools_created: AtomicUsize,
    pools_destroyed: AtomicUsize,
}

impl BufferPoolManager {
    /// Create a manager whose pools may each reserve at most `ceiling` bytes
    pub fn new(ceiling: usize, poll_interval: Duration) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            next_pool_id: AtomicU32::new(1),
            ceiling,
            poll_interval,
            pools_created: AtomicUsize::new(0),
            pools_destroyed: AtomicUsize::new(0),
        }
    }

    /// Create a pool; `InvalidArgument` if it would exceed the ceiling
    pub fn create_pool(&self, config: PoolConfig) -> Result<PoolId> {
        config.validate(self.ceiling)?;

        let pool_id = self.next_pool_id.fetch_add(1, Ordering::SeqCst);
        let name = config.name.clone();
        let pool = BlockPool::new(pool_id, config, self.poll_interval)?;

        self.pools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pool_id, pool);
        self.pools_created.fetch_add(1, Ordering::Relaxed);

        info!("Created pool {} '{}'", pool_id, name);
        Ok(pool_id)
    }

    /// Look up a pool handle
    pub fn pool(&self, pool_id: PoolId) -> Result<BlockPool> {
        self.pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pool_id)
            .cloned()
            .ok_or_else(|| FrameBindError::not_found(format!("pool {}", pool_id)))
    }

    /// Take a block from `pool_id`
    pub fn get_block(&self, pool_id: PoolId, requested_size: usize, blocking: bool) -> Result<Buffer> {
        // The registry lock is not held while waiting for a block
        self.pool(pool_id)?.get_block(requested_size, blocking)
    }

    /// Take a block, waiting at most `timeout_ms`
    pub fn get_block_timeout(&self, pool_id: PoolId, requested_size: usize, timeout_ms: i32) -> Result<Buffer> {
        self.pool(pool_id)?.get_block_timeout(requested_size, timeout_ms)
    }

    /// Release the caller's reference
    pub fn release_block(&self, buffer: Buffer) -> Result<()> {
        buffer.release()
    }

    /// Release a reference held as a bare handle; `DoubleFree` on underflow
    pub fn release_raw(&self, handle: BlockHandle) -> Result<()> {
        self.pool(handle.pool)?.release_raw(handle)
    }

    /// Cache synchronization point
    ///
    /// `for_reader_visibility = true` publishes the producer's writes and must
    /// happen before the buffer is handed to a consumer. `false` invalidates
    /// the block ahead of the next producer write.
    pub fn flush_cache(&self, buffer: &Buffer, for_reader_visibility: bool) -> Result<()> {
        buffer.flush(for_reader_visibility)
    }

    /// Destroy a pool; `Busy` while any of its blocks is referenced
    pub fn destroy_pool(&self, pool_id: PoolId) -> Result<()> {
        let mut pools = self.pools.write().unwrap_or_else(PoisonError::into_inner);
        let pool = pools
            .get(&pool_id)
            .ok_or_else(|| FrameBindError::not_found(format!("pool {}", pool_id)))?;

        pool.destroy()?;
        pools.remove(&pool_id);
        self.pools_destroyed.fetch_add(1, Ordering::Relaxed);

        info!("Destroyed pool {}", pool_id);
        Ok(())
    }

    pub fn pool_stats(&self, pool_id: PoolId) -> Result<PoolStats> {
        Ok(self.pool(pool_id)?.stats())
    }

    /// List all live pools
    pub fn list_pools(&self) -> Vec<(PoolId, String)> {
        let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<_> = pools
            .iter()
            .map(|(id, pool)| (*id, pool.name().to_string()))
            .collect();
        list.sort_by_key(|(id, _)| *id);
        list
    }

    pub fn pool_count(&self) -> usize {
        self.pools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// (created, destroyed) pool counters
    pub fn lifetime_counts(&self) -> (usize, usize) {
        (
            self.pools_created.load(Ordering::Relaxed),
            self.pools_destroyed.load(Ordering::Relaxed),
        )
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }
}
