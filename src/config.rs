//! System-wide configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FrameBindError, Result};

/// Largest total byte size a single pool may reserve by default (1 GiB)
pub const DEFAULT_POOL_CEILING: usize = 1 << 30;

/// Default inbound queue depth for channels whose attributes leave it unset
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

/// Default slice used to break indefinite waits into finite ones
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Largest single picture buffer accepted for pool blocks (8192 x 8192 x 4)
pub const MAX_BLOCK_SIZE: usize = 8192 * 8192 * 4;

/// Configuration shared by every component of a [`crate::MediaSystem`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Upper bound for `block_count * max_block_size` of any one pool
    pub pool_ceiling_bytes: usize,
    /// Queue depth used when a channel attribute leaves it unset
    pub default_queue_depth: usize,
    /// Slice length for waits that are logically indefinite
    pub poll_interval_ms: u64,
    /// Per-attempt `send_frame` timeout for pipeline producers built with
    /// `PipelineConfig::for_system`
    pub send_timeout_ms: i32,
    /// `get_frame` timeout for pipeline consumers built with `PipelineConfig::for_system`
    pub recv_timeout_ms: i32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            pool_ceiling_bytes: DEFAULT_POOL_CEILING,
            default_queue_depth: DEFAULT_QUEUE_DEPTH,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            send_timeout_ms: 20,
            recv_timeout_ms: 100,
        }
    }
}

impl SystemConfig {
    /// Set the pool ceiling
    pub fn with_pool_ceiling(mut self, bytes: usize) -> Self {
        self.pool_ceiling_bytes = bytes;
        self
    }

    /// Set the default queue depth
    pub fn with_default_queue_depth(mut self, depth: usize) -> Self {
        self.default_queue_depth = depth;
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the worker send timeout
    pub fn with_send_timeout_ms(mut self, timeout_ms: i32) -> Self {
        self.send_timeout_ms = timeout_ms;
        self
    }

    /// Set the worker receive timeout
    pub fn with_recv_timeout_ms(mut self, timeout_ms: i32) -> Self {
        self.recv_timeout_ms = timeout_ms;
        self
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.pool_ceiling_bytes == 0 {
            return Err(FrameBindError::invalid_argument(
                "pool_ceiling_bytes",
                "Pool ceiling cannot be zero",
            ));
        }

        if self.default_queue_depth == 0 {
            return Err(FrameBindError::invalid_argument(
                "default_queue_depth",
                "Default queue depth cannot be zero",
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(FrameBindError::invalid_argument(
                "poll_interval_ms",
                "Poll interval cannot be zero",
            ));
        }

        Ok(())
    }
}

/// Builder pattern for system configuration
pub struct SystemConfigBuilder {
    config: SystemConfig,
}

impl SystemConfigBuilder {
    /// Create a builder seeded with defaults
    pub fn new() -> Self {
        Self {
            config: SystemConfig::default(),
        }
    }

    pub fn pool_ceiling(mut self, bytes: usize) -> Self {
        self.config.pool_ceiling_bytes = bytes;
        self
    }

    pub fn default_queue_depth(mut self, depth: usize) -> Self {
        self.config.default_queue_depth = depth;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn send_timeout_ms(mut self, timeout_ms: i32) -> Self {
        self.config.send_timeout_ms = timeout_ms;
        self
    }

    pub fn recv_timeout_ms(mut self, timeout_ms: i32) -> Self {
        self.config.recv_timeout_ms = timeout_ms;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SystemConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for SystemConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
