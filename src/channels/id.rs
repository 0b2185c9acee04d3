//! Channel identity

use std::fmt;

use serde::{Deserialize, Serialize};

/// Processing module a channel belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModuleKind {
    VideoInput,
    VideoProcess,
    VideoEncode,
    VideoDecode,
    VideoOutput,
    Region,
}

impl ModuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModuleKind::VideoInput => "vi",
            ModuleKind::VideoProcess => "vpss",
            ModuleKind::VideoEncode => "venc",
            ModuleKind::VideoDecode => "vdec",
            ModuleKind::VideoOutput => "vo",
            ModuleKind::Region => "rgn",
        }
    }
}

/// (module, device, channel) triple naming one processing channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId {
    pub kind: ModuleKind,
    pub device: u32,
    pub channel: u32,
}

impl ChannelId {
    pub const fn new(kind: ModuleKind, device: u32, channel: u32) -> Self {
        Self { kind, device, channel }
    }

    pub const fn process(group: u32, channel: u32) -> Self {
        Self::new(ModuleKind::VideoProcess, group, channel)
    }

    pub const fn encode(channel: u32) -> Self {
        Self::new(ModuleKind::VideoEncode, 0, channel)
    }

    pub const fn decode(channel: u32) -> Self {
        Self::new(ModuleKind::VideoDecode, 0, channel)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}:{}]", self.kind.name(), self.device, self.channel)
    }
}
