//! Pixel layouts and compression modes

use serde::{Deserialize, Serialize};

use crate::error::{FrameBindError, Result};

/// Pixel layout of a frame's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Semi-planar 4:2:0, one luma plane plus interleaved chroma
    #[default]
    Yuv420Sp,
    /// Semi-planar 4:2:2
    Yuv422Sp,
    Rgb888,
    Bgr888,
    Rgba8888,
    Argb8888,
}

impl PixelFormat {
    /// Bytes needed for one frame with the given virtual (stride) geometry
    pub fn buffer_size(&self, vir_width: u32, vir_height: u32) -> usize {
        let pixels = vir_width as usize * vir_height as usize;
        match self {
            PixelFormat::Yuv420Sp => pixels * 3 / 2,
            PixelFormat::Yuv422Sp => pixels * 2,
            PixelFormat::Rgb888 | PixelFormat::Bgr888 => pixels * 3,
            PixelFormat::Rgba8888 | PixelFormat::Argb8888 => pixels * 4,
        }
    }

    /// Bytes per pixel of the first plane
    pub fn luma_bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Yuv420Sp | PixelFormat::Yuv422Sp => 1,
            PixelFormat::Rgb888 | PixelFormat::Bgr888 => 3,
            PixelFormat::Rgba8888 | PixelFormat::Argb8888 => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Yuv420Sp => "yuv420sp",
            PixelFormat::Yuv422Sp => "yuv422sp",
            PixelFormat::Rgb888 => "rgb888",
            PixelFormat::Bgr888 => "bgr888",
            PixelFormat::Rgba8888 => "rgba8888",
            PixelFormat::Argb8888 => "argb8888",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        let format = match name.to_ascii_lowercase().as_str() {
            "yuv420sp" | "nv12" => PixelFormat::Yuv420Sp,
            "yuv422sp" | "nv16" => PixelFormat::Yuv422Sp,
            "rgb888" => PixelFormat::Rgb888,
            "bgr888" => PixelFormat::Bgr888,
            "rgba8888" => PixelFormat::Rgba8888,
            "argb8888" => PixelFormat::Argb8888,
            other => {
                return Err(FrameBindError::invalid_argument(
                    "pixel_format",
                    format!("Unknown pixel format '{}'", other),
                ))
            }
        };
        Ok(format)
    }
}

/// Payload compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompressMode {
    #[default]
    None,
    /// ARM frame buffer compression with 16x16 superblocks
    Afbc16x16,
}

impl CompressMode {
    pub fn is_compressed(&self) -> bool {
        !matches!(self, CompressMode::None)
    }
}
