//! Per-module channel attributes

use serde::{Deserialize, Serialize};

use crate::{
    error::{FrameBindError, Result},
    frame::{CodecId, PixelFormat},
};

use super::id::ModuleKind;

/// Video input (capture) channel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputAttr {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// Inbound queue depth, system default when unset
    pub depth: Option<usize>,
}

/// Video processing (scale/crop) channel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessAttr {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub depth: Option<usize>,
}

/// Encoder channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeAttr {
    pub codec: CodecId,
    pub width: u32,
    pub height: u32,
    pub vir_width: u32,
    pub vir_height: u32,
    pub pixel_format: PixelFormat,
    pub bitrate_kbps: u32,
    /// Frames between key frames
    pub gop: u32,
    /// Number of output stream buffers
    pub stream_buffer_count: u32,
    pub depth: Option<usize>,
}

impl Default for EncodeAttr {
    fn default() -> Self {
        Self {
            codec: CodecId::Avc,
            width: 1920,
            height: 1080,
            vir_width: 1920,
            vir_height: 1080,
            pixel_format: PixelFormat::Yuv420Sp,
            bitrate_kbps: 10 * 1024,
            gop: 60,
            stream_buffer_count: 8,
            depth: None,
        }
    }
}

/// Decoder channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeAttr {
    pub codec: CodecId,
    pub max_width: u32,
    pub max_height: u32,
    pub frame_buffer_count: u32,
    pub depth: Option<usize>,
}

impl Default for DecodeAttr {
    fn default() -> Self {
        Self {
            codec: CodecId::Avc,
            max_width: 4096,
            max_height: 2304,
            frame_buffer_count: 8,
            depth: None,
        }
    }
}

/// Bitmap overlay region
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OverlayAttr {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub layer: u32,
    pub depth: Option<usize>,
}

/// Solid-colour cover region
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoverAttr {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// 0xRRGGBB
    pub color: u32,
    pub depth: Option<usize>,
}

/// Display output channel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputAttr {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub frame_rate: u32,
    pub depth: Option<usize>,
}

/// Creation attributes, one variant per module kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelAttr {
    Input(InputAttr),
    Process(ProcessAttr),
    Encode(EncodeAttr),
    Decode(DecodeAttr),
    Overlay(OverlayAttr),
    Cover(CoverAttr),
    Output(OutputAttr),
}

impl ChannelAttr {
    /// Module kind this attribute configures
    pub fn kind(&self) -> ModuleKind {
        match self {
            ChannelAttr::Input(_) => ModuleKind::VideoInput,
            ChannelAttr::Process(_) => ModuleKind::VideoProcess,
            ChannelAttr::Encode(_) => ModuleKind::VideoEncode,
            ChannelAttr::Decode(_) => ModuleKind::VideoDecode,
            ChannelAttr::Overlay(_) | ChannelAttr::Cover(_) => ModuleKind::Region,
            ChannelAttr::Output(_) => ModuleKind::VideoOutput,
        }
    }

    /// Requested inbound queue depth
    pub fn depth(&self) -> Option<usize> {
        match self {
            ChannelAttr::Input(a) => a.depth,
            ChannelAttr::Process(a) => a.depth,
            ChannelAttr::Encode(a) => a.depth,
            ChannelAttr::Decode(a) => a.depth,
            ChannelAttr::Overlay(a) => a.depth,
            ChannelAttr::Cover(a) => a.depth,
            ChannelAttr::Output(a) => a.depth,
        }
    }

    /// Check the variant matches `kind` and its fields are usable
    pub fn validate(&self, kind: ModuleKind) -> Result<()> {
        if self.kind() != kind {
            return Err(FrameBindError::invalid_argument(
                "attr",
                format!("{:?} attributes cannot configure a {} channel", self.kind(), kind.name()),
            ));
        }

        if self.depth() == Some(0) {
            return Err(FrameBindError::invalid_argument(
                "depth",
                "Queue depth must be greater than zero",
            ));
        }

        let (width, height) = match self {
            ChannelAttr::Input(a) => (a.width, a.height),
            ChannelAttr::Process(a) => (a.width, a.height),
            ChannelAttr::Encode(a) => {
                if a.vir_width < a.width || a.vir_height < a.height {
                    return Err(FrameBindError::invalid_argument(
                        "vir_width",
                        "Virtual size must cover the picture size",
                    ));
                }
                (a.width, a.height)
            }
            ChannelAttr::Decode(a) => (a.max_width, a.max_height),
            ChannelAttr::Overlay(a) => (a.width, a.height),
            ChannelAttr::Cover(a) => (a.width, a.height),
            ChannelAttr::Output(a) => (a.width, a.height),
        };

        if width == 0 || height == 0 {
            return Err(FrameBindError::invalid_argument(
                "size",
                format!("Channel size {}x{} must be non-zero", width, height),
            ));
        }
        Ok(())
    }

    /// Processing channel attributes for `width` x `height`
    pub fn process(width: u32, height: u32) -> Self {
        ChannelAttr::Process(ProcessAttr {
            width,
            height,
            ..ProcessAttr::default()
        })
    }

    /// Encoder attributes for `codec` at `width` x `height`
    pub fn encode(codec: CodecId, width: u32, height: u32) -> Self {
        ChannelAttr::Encode(EncodeAttr {
            codec,
            width,
            height,
            vir_width: width,
            vir_height: height,
            ..EncodeAttr::default()
        })
    }

    /// Copy with the inbound queue depth set
    pub fn with_depth(mut self, depth: usize) -> Self {
        let slot = match &mut self {
            ChannelAttr::Input(a) => &mut a.depth,
            ChannelAttr::Process(a) => &mut a.depth,
            ChannelAttr::Encode(a) => &mut a.depth,
            ChannelAttr::Decode(a) => &mut a.depth,
            ChannelAttr::Overlay(a) => &mut a.depth,
            ChannelAttr::Cover(a) => &mut a.depth,
            ChannelAttr::Output(a) => &mut a.depth,
        };
        *slot = Some(depth);
        self
    }
}
