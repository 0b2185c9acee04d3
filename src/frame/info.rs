//! Frame metadata

use std::{
    fmt,
    ops::{BitOr, BitOrAssign},
};

use serde::{Deserialize, Serialize};

use crate::error::{FrameBindError, Result};

use super::{
    codec::CodecId,
    format::{CompressMode, PixelFormat},
};

/// Frame flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FrameFlags(u32);

impl FrameFlags {
    pub const NONE: FrameFlags = FrameFlags(0);
    /// Last frame of a stream
    pub const END_OF_STREAM: FrameFlags = FrameFlags(1 << 0);
    /// Last frame of a snapshot burst
    pub const SNAP_END: FrameFlags = FrameFlags(1 << 1);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        FrameFlags(bits)
    }

    pub fn contains(&self, other: FrameFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: FrameFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: FrameFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for FrameFlags {
    type Output = FrameFlags;

    fn bitor(self, rhs: FrameFlags) -> FrameFlags {
        FrameFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for FrameFlags {
    fn bitor_assign(&mut self, rhs: FrameFlags) {
        self.0 |= rhs.0;
    }
}

/// Geometry, format and stream position of one frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    /// Visible width in pixels
    pub width: u32,
    /// Visible height in pixels
    pub height: u32,
    /// Row stride in pixels
    pub vir_width: u32,
    /// Allocated rows
    pub vir_height: u32,
    pub pixel_format: PixelFormat,
    pub compress_mode: CompressMode,
    pub flags: FrameFlags,
    /// Per-stream sequence number
    pub sequence: u64,
    /// Presentation timestamp in microseconds
    pub pts: u64,
    pub codec: CodecId,
    /// CRC32 of the payload, zero when not computed
    pub checksum: u32,
}

impl Default for FrameInfo {
    fn default() -> Self {
        Self::new(0, 0, PixelFormat::default())
    }
}

impl FrameInfo {
    /// Metadata for a `width` x `height` frame with unpadded strides
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            vir_width: width,
            vir_height: height,
            pixel_format,
            compress_mode: CompressMode::None,
            flags: FrameFlags::NONE,
            sequence: 0,
            pts: 0,
            codec: CodecId::Unused,
            checksum: 0,
        }
    }

    pub fn with_virtual_size(mut self, vir_width: u32, vir_height: u32) -> Self {
        self.vir_width = vir_width;
        self.vir_height = vir_height;
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_pts(mut self, pts: u64) -> Self {
        self.pts = pts;
        self
    }

    pub fn with_codec(mut self, codec: CodecId) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_compress_mode(mut self, mode: CompressMode) -> Self {
        self.compress_mode = mode;
        self
    }

    pub fn with_flags(mut self, flags: FrameFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Bytes an uncompressed payload occupies
    pub fn buffer_size(&self) -> usize {
        self.pixel_format.buffer_size(self.vir_width, self.vir_height)
    }

    pub fn is_eos(&self) -> bool {
        self.flags.contains(FrameFlags::END_OF_STREAM)
    }

    pub fn set_eos(&mut self, eos: bool) {
        if eos {
            self.flags.insert(FrameFlags::END_OF_STREAM);
        } else {
            self.flags.remove(FrameFlags::END_OF_STREAM);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.vir_width < self.width {
            return Err(FrameBindError::invalid_argument(
                "vir_width",
                format!("Stride {} is smaller than width {}", self.vir_width, self.width),
            ));
        }
        if self.vir_height < self.height {
            return Err(FrameBindError::invalid_argument(
                "vir_height",
                format!("Virtual height {} is smaller than height {}", self.vir_height, self.height),
            ));
        }
        Ok(())
    }

    /// Calculate and store the payload checksum
    pub fn set_checksum(&mut self, payload: &[u8]) {
        self.checksum = crc32fast::hash(payload);
    }

    /// Check `payload` against the stored checksum; always true when unset
    pub fn verify_checksum(&self, payload: &[u8]) -> bool {
        self.checksum == 0 || self.checksum == crc32fast::hash(payload)
    }
}

impl fmt::Display for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {}x{} ({}x{}) {}{}",
            self.sequence,
            self.width,
            self.height,
            self.vir_width,
            self.vir_height,
            self.pixel_format.name(),
            if self.is_eos() { " eos" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let mut flags = FrameFlags::NONE;
        flags |= FrameFlags::SNAP_END;
        assert!(flags.contains(FrameFlags::SNAP_END));
        assert!(!flags.contains(FrameFlags::END_OF_STREAM));
        flags.remove(FrameFlags::SNAP_END);
        assert_eq!(flags, FrameFlags::NONE);
    }

    #[test]
    fn test_eos_and_geometry() {
        let mut info = FrameInfo::new(1280, 720, PixelFormat::Yuv420Sp).with_virtual_size(1280, 736);
        assert_eq!(info.buffer_size(), 1280 * 736 * 3 / 2);
        assert!(!info.is_eos());
        info.set_eos(true);
        assert!(info.is_eos());
        assert!(info.validate().is_ok());
        assert!(info.with_virtual_size(1000, 720).validate().is_err());
    }

    #[test]
    fn test_checksum() {
        let mut info = FrameInfo::default();
        assert!(info.verify_checksum(b"anything"));
        info.set_checksum(b"payload");
        assert!(info.verify_checksum(b"payload"));
        assert!(!info.verify_checksum(b"payloaD"));
    }
}
