//! Block pools and reference-counted buffers
//!
//! Pools are arenas of equally sized blocks. A block is handed out as a
//! [`Buffer`], moved from producer to queue to consumer, and returned to its
//! pool's free list when the last reference goes away.

pub mod buffer;
pub mod config;
pub mod manager;
pub mod pool;
pub(crate) mod region;
pub mod stats;

// Re-export main types
pub use buffer::Buffer;
pub use config::{BackingType, BlockSizePolicy, CacheMode, PoolConfig, PoolConfigBuilder};
pub use manager::BufferPoolManager;
pub use pool::{BlockHandle, BlockPool, PoolId};
pub use region::BLOCK_ALIGNMENT;
pub use stats::{AtomicPoolStats, PoolStats};
