//! Producer loop: pool block → source bytes → flush → send

use log::{debug, info};

use crate::{
    buffers::{BlockPool, Buffer},
    channels::ChannelId,
    error::{FrameBindError, Result},
    frame::{Frame, FrameFlags, FrameInfo},
    system::MediaSystem,
};

use super::{
    retry::{send_with_retry, RetryPolicy, SendOutcome},
    source::{read_full, ByteSource},
    stop::StopSignal,
};

/// What a producer did before it exited
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerReport {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub retries: u64,
    /// The last frame sent carried end-of-stream
    pub sent_eos: bool,
}

/// Drives frames from a [`ByteSource`] into a channel
pub struct Producer {
    pub(crate) system: MediaSystem,
    pub(crate) channel: ChannelId,
    pub(crate) pool: BlockPool,
    pub(crate) template: FrameInfo,
    pub(crate) source: Box<dyn ByteSource>,
    /// Passes over the source, -1 to rewind forever
    pub(crate) loop_count: i32,
    /// Frames to send before forcing end of stream, -1 for no limit
    pub(crate) snap_count: i64,
    pub(crate) retry: RetryPolicy,
    pub(crate) stop: StopSignal,
}

impl Producer {
    /// Run until end of stream or stop
    pub fn run(mut self) -> Result<ProducerReport> {
        let frame_size = self.template.buffer_size();
        let mut report = ProducerReport::default();
        let mut loops_left = self.loop_count;
        // Full frames read since the last rewind
        let mut pass_frames = 0u64;
        let mut sequence = 0u64;

        info!("{}: producer started, {} byte frames", self.channel, frame_size);

        while !self.stop.is_stopped() {
            let mut buffer = match self.acquire(frame_size)? {
                Some(buffer) => buffer,
                None => break,
            };

            let filled = {
                let slice = buffer.as_mut_slice()?;
                read_full(self.source.as_mut(), &mut slice[..frame_size])
                    .map_err(|e| FrameBindError::from_io(e, "reading frame source"))?
            };

            let mut flags = FrameFlags::NONE;
            if filled < frame_size {
                // A pass without one full frame would rewind forever
                if pass_frames > 0 && (loops_left < 0 || loops_left > 1) {
                    if loops_left > 0 {
                        loops_left -= 1;
                    }
                    debug!("{}: end of source, {} passes left", self.channel, loops_left);
                    drop(buffer);
                    pass_frames = 0;
                    self.source
                        .rewind()
                        .map_err(|e| FrameBindError::from_io(e, "rewinding frame source"))?;
                    continue;
                }
                flags |= FrameFlags::END_OF_STREAM;
            } else {
                pass_frames += 1;
            }
            if self.snap_count >= 0 && report.frames_sent as i64 + 1 >= self.snap_count {
                flags |= FrameFlags::END_OF_STREAM | FrameFlags::SNAP_END;
            }

            buffer.set_len(filled)?;
            self.system.flush_cache(&buffer, true)?;

            let info = self
                .template
                .clone()
                .with_sequence(sequence)
                .with_pts(sequence * 33_333)
                .with_flags(flags);
            let mut frame = Frame::new(info, buffer);
            frame.seal();
            let eos = frame.is_eos();

            match send_with_retry(&self.system, self.channel, frame, &self.retry, &self.stop)? {
                SendOutcome::Sent { retries } => {
                    report.frames_sent += 1;
                    report.bytes_sent += filled as u64;
                    report.retries += retries as u64;
                    sequence += 1;
                }
                SendOutcome::Stopped { retries } => {
                    report.retries += retries as u64;
                    break;
                }
            }

            if eos {
                report.sent_eos = true;
                info!("{}: reached end of stream after {} frames", self.channel, report.frames_sent);
                break;
            }
        }

        info!("{}: producer exiting, {} frames sent", self.channel, report.frames_sent);
        Ok(report)
    }

    /// Block for a free pool block in poll-sized slices; `None` once stopped
    fn acquire(&self, frame_size: usize) -> Result<Option<Buffer>> {
        let slice_ms = self.system.config().poll_interval_ms.min(i32::MAX as u64) as i32;
        loop {
            match self.pool.get_block_timeout(frame_size, slice_ms) {
                Ok(buffer) => return Ok(Some(buffer)),
                Err(FrameBindError::Timeout { .. }) => {
                    if self.stop.is_stopped() {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
