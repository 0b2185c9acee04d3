//! Frames: metadata plus exactly one pool buffer

pub mod codec;
pub mod compare;
pub mod format;
pub mod info;

pub use codec::CodecId;
pub use compare::compare_fuzzy;
pub use format::{CompressMode, PixelFormat};
pub use info::{FrameFlags, FrameInfo};

use crate::{buffers::Buffer, channels::ChannelId};

/// A unit of media data moving through the router
///
/// Owning a `Frame` means owning its buffer reference; dropping the frame
/// returns the block to its pool.
#[derive(Debug)]
pub struct Frame {
    info: FrameInfo,
    buffer: Buffer,
    delivered_by: Option<ChannelId>,
}

impl Frame {
    pub fn new(info: FrameInfo, buffer: Buffer) -> Self {
        Self {
            info,
            buffer,
            delivered_by: None,
        }
    }

    /// An end-of-stream frame
    pub fn eos(mut info: FrameInfo, buffer: Buffer) -> Self {
        info.set_eos(true);
        Self::new(info, buffer)
    }

    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut FrameInfo {
        &mut self.info
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// Valid payload bytes
    pub fn payload(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn is_eos(&self) -> bool {
        self.info.is_eos()
    }

    /// Channel whose queue handed this frame out, if any
    pub fn delivered_by(&self) -> Option<ChannelId> {
        self.delivered_by
    }

    pub(crate) fn set_delivered_by(&mut self, channel: ChannelId) {
        self.delivered_by = Some(channel);
    }

    /// Store the CRC32 of the current payload in the metadata
    pub fn seal(&mut self) {
        let checksum = crc32fast::hash(self.buffer.as_slice());
        self.info.checksum = checksum;
    }

    pub fn verify(&self) -> bool {
        self.info.verify_checksum(self.buffer.as_slice())
    }

    pub fn into_buffer(self) -> Buffer {
        self.buffer
    }

    pub fn into_parts(self) -> (FrameInfo, Buffer) {
        (self.info, self.buffer)
    }
}
