//! Processing channels: identity, attributes, lifecycle and inbound queues

pub mod attr;
pub mod id;
pub(crate) mod queue;
pub mod registry;
pub mod state;
pub mod stats;

pub use attr::{ChannelAttr, CoverAttr, DecodeAttr, EncodeAttr, InputAttr, OutputAttr, OverlayAttr, ProcessAttr};
pub use id::{ChannelId, ModuleKind};
pub use registry::ChannelRegistry;
pub use state::ChannelState;
pub use stats::{AtomicChannelStats, ChannelStats};
