//! # framebind - Buffer Pools and Dynamic Channel Binding for Media Pipelines
//!
//! framebind moves video frames between processing channels. Frames live in
//! reference-counted blocks drawn from fixed-capacity pools, travel through
//! bounded per-channel queues, and follow a routing table that can be rebound
//! while traffic is flowing.
//!
//! ## Features
//!
//! - **Block pools**: fixed or capped block sizes, heap or anonymous mapped
//!   backing, FIFO blocking waits, double-free detection
//! - **Cache visibility**: cached pools track dirty blocks and refuse to hand
//!   unflushed data to a consumer
//! - **Channel lifecycle**: create, start, stop, destroy with strict ordering
//! - **Runtime binding**: one destination per source, rebindable under load
//! - **Timeouts everywhere**: poll, bounded, or indefinite waits on every
//!   blocking call
//! - **Workers**: producer/consumer thread pairs with backoff and cooperative
//!   cancellation
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────── MediaSystem ────────────────────────┐
//! │                                                             │
//! │  BufferPoolManager   ChannelRegistry   BindGraph            │
//! │  - block pools       - lifecycle       - src -> dst edges   │
//! │  - refcounts         - frame queues    - RwLock             │
//! │          ▲                  ▲               ▲               │
//! │          │                  └─── FrameRouter┘               │
//! └──────────┼──────────────────────────▲───────────────────────┘
//!            │                          │
//!     ┌──────┴──────┐            ┌──────┴──────┐
//!     │  Producer   │  send ───▶ │  Consumer   │
//!     └─────────────┘            └─────────────┘
//! ```

// Core modules
pub mod bind;
pub mod buffers;
pub mod channels;
pub mod config;
pub mod error;
pub mod frame;
pub mod router;
pub mod system;
pub mod timeout;

// Threads driving frames through a system
pub mod workers;

// Main API re-exports
pub use bind::BindGraph;
pub use buffers::{
    BackingType, BlockHandle, BlockPool, BlockSizePolicy, Buffer, BufferPoolManager, CacheMode, PoolConfig,
    PoolConfigBuilder, PoolId, PoolStats,
};
pub use channels::{ChannelAttr, ChannelId, ChannelRegistry, ChannelState, ChannelStats, ModuleKind};
pub use config::{SystemConfig, SystemConfigBuilder};
pub use error::{FrameBindError, Result};
pub use frame::{compare_fuzzy, CodecId, CompressMode, Frame, FrameFlags, FrameInfo, PixelFormat};
pub use router::{FrameRouter, Rejected};
pub use system::{MediaSystem, SystemStats};
pub use timeout::WaitMode;
pub use workers::{
    ByteSink, ByteSource, Pipeline, PipelineConfig, PipelineHandle, PipelineReport, RetryPolicy, StopSignal,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
