//! Top-level context owning pools, channels, the bind graph and the router

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use log::info;

use crate::{
    bind::BindGraph,
    buffers::{BlockHandle, BlockPool, Buffer, BufferPoolManager, PoolConfig, PoolId, PoolStats},
    channels::{ChannelAttr, ChannelId, ChannelRegistry, ChannelState, ChannelStats},
    config::SystemConfig,
    error::Result,
    frame::Frame,
    router::{FrameRouter, Rejected},
};

/// System-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemStats {
    pub pools_created: u64,
    pub pools_destroyed: u64,
    pub channels_created: u64,
    pub channels_destroyed: u64,
    pub binds: u64,
    pub unbinds: u64,
}

#[derive(Debug, Default)]
struct AtomicSystemStats {
    channels_created: AtomicU64,
    channels_destroyed: AtomicU64,
}

/// One media system instance
///
/// Every component hangs off this context; there is no process-wide state, so
/// several systems can coexist in one process (and in one test binary).
/// Cloning is cheap and shares the same underlying system.
#[derive(Debug, Clone)]
pub struct MediaSystem {
    config: SystemConfig,
    pools: Arc<BufferPoolManager>,
    channels: Arc<ChannelRegistry>,
    graph: Arc<BindGraph>,
    router: FrameRouter,
    stats: Arc<AtomicSystemStats>,
}

impl MediaSystem {
    /// Create a system after validating `config`
    pub fn new(config: SystemConfig) -> Result<Self> {
        config.validate()?;

        let pools = Arc::new(BufferPoolManager::new(
            config.pool_ceiling_bytes,
            config.poll_interval(),
        ));
        let channels = Arc::new(ChannelRegistry::new(config.default_queue_depth));
        let graph = Arc::new(BindGraph::new());
        let router = FrameRouter::new(channels.clone(), graph.clone(), config.poll_interval());

        info!(
            "Media system up: ceiling {} bytes, queue depth {}, poll {} ms",
            config.pool_ceiling_bytes, config.default_queue_depth, config.poll_interval_ms
        );

        Ok(Self {
            config,
            pools,
            channels,
            graph,
            router,
            stats: Arc::new(AtomicSystemStats::default()),
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(SystemConfig::default())
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn pools(&self) -> &Arc<BufferPoolManager> {
        &self.pools
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    pub fn graph(&self) -> &Arc<BindGraph> {
        &self.graph
    }

    pub fn router(&self) -> &FrameRouter {
        &self.router
    }

    // Buffer pools

    pub fn create_pool(&self, config: PoolConfig) -> Result<PoolId> {
        self.pools.create_pool(config)
    }

    pub fn pool(&self, pool_id: PoolId) -> Result<BlockPool> {
        self.pools.pool(pool_id)
    }

    pub fn get_block(&self, pool_id: PoolId, requested_size: usize, blocking: bool) -> Result<Buffer> {
        self.pools.get_block(pool_id, requested_size, blocking)
    }

    pub fn get_block_timeout(&self, pool_id: PoolId, requested_size: usize, timeout_ms: i32) -> Result<Buffer> {
        self.pools.get_block_timeout(pool_id, requested_size, timeout_ms)
    }

    pub fn release_block(&self, buffer: Buffer) -> Result<()> {
        self.pools.release_block(buffer)
    }

    pub fn release_raw(&self, handle: BlockHandle) -> Result<()> {
        self.pools.release_raw(handle)
    }

    pub fn flush_cache(&self, buffer: &Buffer, for_reader_visibility: bool) -> Result<()> {
        self.pools.flush_cache(buffer, for_reader_visibility)
    }

    pub fn destroy_pool(&self, pool_id: PoolId) -> Result<()> {
        self.pools.destroy_pool(pool_id)
    }

    pub fn pool_stats(&self, pool_id: PoolId) -> Result<PoolStats> {
        self.pools.pool_stats(pool_id)
    }

    // Channels

    pub fn create_channel(&self, id: ChannelId, attr: ChannelAttr) -> Result<()> {
        self.channels.create(id, attr)?;
        self.stats.channels_created.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn start_receiving(&self, id: ChannelId, max_frames: i32) -> Result<()> {
        self.channels.start_receiving(id, max_frames)
    }

    pub fn stop_receiving(&self, id: ChannelId) -> Result<()> {
        self.channels.stop_receiving(id)
    }

    pub fn destroy_channel(&self, id: ChannelId) -> Result<()> {
        self.channels.destroy(id, &self.graph)?;
        self.stats.channels_destroyed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn channel_state(&self, id: ChannelId) -> ChannelState {
        self.channels.state(id)
    }

    pub fn channel_stats(&self, id: ChannelId) -> Result<ChannelStats> {
        self.channels.stats(id)
    }

    // Binding

    pub fn bind(&self, src: ChannelId, dst: ChannelId) -> Result<()> {
        self.graph.bind(src, dst)
    }

    pub fn unbind(&self, src: ChannelId, dst: ChannelId) -> Result<()> {
        self.graph.unbind(src, dst)
    }

    pub fn destination(&self, src: ChannelId) -> Option<ChannelId> {
        self.graph.destination(src)
    }

    // Frames

    pub fn send_frame(&self, src: ChannelId, frame: Frame, timeout_ms: i32) -> std::result::Result<(), Rejected> {
        self.router.send_frame(src, frame, timeout_ms)
    }

    pub fn get_frame(&self, dst: ChannelId, timeout_ms: i32) -> Result<Frame> {
        self.router.get_frame(dst, timeout_ms)
    }

    pub fn release_frame(&self, dst: ChannelId, frame: Frame) -> std::result::Result<(), Rejected> {
        self.router.release_frame(dst, frame)
    }

    pub fn stats(&self) -> SystemStats {
        let (pools_created, pools_destroyed) = self.pools.lifetime_counts();
        let (binds, unbinds) = self.graph.counts();
        SystemStats {
            pools_created: pools_created as u64,
            pools_destroyed: pools_destroyed as u64,
            channels_created: self.stats.channels_created.load(Ordering::Relaxed),
            channels_destroyed: self.stats.channels_destroyed.load(Ordering::Relaxed),
            binds,
            unbinds,
        }
    }
}
