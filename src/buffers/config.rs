//! Block pool configuration

use serde::{Deserialize, Serialize};

use crate::{
    config::MAX_BLOCK_SIZE,
    error::{FrameBindError, Result},
};

/// How block sizes are assigned at `get_block` time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockSizePolicy {
    /// Every block is exactly this many bytes; requests only need to fit
    Fixed(usize),
    /// Each request chooses its own length, up to this maximum
    UpTo(usize),
}

impl BlockSizePolicy {
    /// Largest number of bytes a single block can hold
    pub fn max_block_size(&self) -> usize {
        match *self {
            BlockSizePolicy::Fixed(size) | BlockSizePolicy::UpTo(size) => size,
        }
    }

    /// Length handed out for a request of `requested` bytes
    pub(crate) fn resolve(&self, requested: usize) -> Result<usize> {
        let max = self.max_block_size();
        if requested > max {
            return Err(FrameBindError::invalid_argument(
                "requested_size",
                format!("Requested {} bytes exceeds block capacity {}", requested, max),
            ));
        }

        match *self {
            BlockSizePolicy::Fixed(size) => Ok(size),
            BlockSizePolicy::UpTo(_) if requested == 0 => Err(FrameBindError::invalid_argument(
                "requested_size",
                "Variable-size pools need a non-zero request",
            )),
            BlockSizePolicy::UpTo(_) => Ok(requested),
        }
    }
}

/// Where the pool's memory comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackingType {
    /// Plain heap allocation
    Heap,
    /// Anonymous memory mapping
    #[cfg(feature = "mapped")]
    Mapped,
}

impl Default for BackingType {
    fn default() -> Self {
        Self::Heap
    }
}

impl BackingType {
    /// Get a human-readable name for the backing type
    pub fn name(&self) -> &'static str {
        match self {
            BackingType::Heap => "heap",
            #[cfg(feature = "mapped")]
            BackingType::Mapped => "mapped",
        }
    }
}

/// Cache visibility model for a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CacheMode {
    /// Writes are visible to readers immediately; flushes are bookkeeping only
    #[default]
    Coherent,
    /// Writes must be flushed before a buffer is handed to a reader
    Cached,
}

/// Configuration for a block pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Name used in logs and stats
    pub name: String,
    /// Block size policy
    pub block_size: BlockSizePolicy,
    /// Number of blocks in the pool
    pub block_count: usize,
    /// Memory backing
    pub backing: BackingType,
    /// Cache visibility model
    pub cache_mode: CacheMode,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            block_size: BlockSizePolicy::Fixed(4096),
            block_count: 8,
            backing: BackingType::Heap,
            cache_mode: CacheMode::Coherent,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with custom name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Fixed-size blocks
    pub fn with_fixed_size(mut self, size: usize) -> Self {
        self.block_size = BlockSizePolicy::Fixed(size);
        self
    }

    /// Variable-size blocks up to `max`
    pub fn with_max_size(mut self, max: usize) -> Self {
        self.block_size = BlockSizePolicy::UpTo(max);
        self
    }

    /// Set block count
    pub fn with_block_count(mut self, count: usize) -> Self {
        self.block_count = count;
        self
    }

    /// Set memory backing
    pub fn with_backing(mut self, backing: BackingType) -> Self {
        self.backing = backing;
        self
    }

    /// Set cache mode
    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    /// Total bytes the pool reserves, before alignment padding
    pub fn total_memory_required(&self) -> usize {
        self.block_count
            .saturating_mul(self.block_size.max_block_size())
    }

    /// Validate the configuration against a system ceiling
    pub fn validate(&self, ceiling: usize) -> Result<()> {
        let block_size = self.block_size.max_block_size();
        if block_size == 0 {
            return Err(FrameBindError::invalid_argument(
                "block_size",
                "Block size cannot be zero",
            ));
        }

        if block_size > MAX_BLOCK_SIZE {
            return Err(FrameBindError::invalid_argument(
                "block_size",
                format!("Block size {} exceeds {}", block_size, MAX_BLOCK_SIZE),
            ));
        }

        if self.block_count == 0 {
            return Err(FrameBindError::invalid_argument(
                "block_count",
                "Block count cannot be zero",
            ));
        }

        let total = self.total_memory_required();
        if total > ceiling {
            return Err(FrameBindError::invalid_argument(
                "block_count",
                format!("Pool needs {} bytes, ceiling is {}", total, ceiling),
            ));
        }

        Ok(())
    }
}

/// Builder pattern for pool configuration
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: PoolConfig::new(name),
        }
    }

    pub fn fixed_size(mut self, size: usize) -> Self {
        self.config.block_size = BlockSizePolicy::Fixed(size);
        self
    }

    pub fn max_size(mut self, max: usize) -> Self {
        self.config.block_size = BlockSizePolicy::UpTo(max);
        self
    }

    pub fn block_count(mut self, count: usize) -> Self {
        self.config.block_count = count;
        self
    }

    pub fn backing(mut self, backing: BackingType) -> Self {
        self.config.backing = backing;
        self
    }

    pub fn cached(mut self) -> Self {
        self.config.cache_mode = CacheMode::Cached;
        self
    }

    /// Build the configuration, validated against `ceiling`
    pub fn build(self, ceiling: usize) -> Result<PoolConfig> {
        self.config.validate(ceiling)?;
        Ok(self.config)
    }
}
