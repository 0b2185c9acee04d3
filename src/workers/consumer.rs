//! Consumer loop: get frame → sink → release

use log::{info, warn};

use crate::{
    channels::ChannelId,
    error::{FrameBindError, Result},
    system::MediaSystem,
};

use super::{sink::ByteSink, stop::StopSignal};

/// What a consumer did before it exited
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    pub frames_received: u64,
    pub bytes_written: u64,
    pub reached_eos: bool,
    /// Delivered payloads whose checksum did not match their metadata
    pub checksum_mismatches: u64,
}

/// Drains a channel into a [`ByteSink`]
pub struct Consumer {
    pub(crate) system: MediaSystem,
    pub(crate) channel: ChannelId,
    pub(crate) sink: Box<dyn ByteSink>,
    pub(crate) recv_timeout_ms: i32,
    pub(crate) stop: StopSignal,
}

impl Consumer {
    /// Run until end of stream, stop, or the channel is stopped and drained
    pub fn run(mut self) -> Result<ConsumerReport> {
        let mut report = ConsumerReport::default();
        info!("{}: consumer started", self.channel);

        loop {
            let frame = match self.system.get_frame(self.channel, self.recv_timeout_ms) {
                Ok(frame) => frame,
                Err(FrameBindError::Timeout { .. }) => {
                    if self.stop.is_stopped() {
                        break;
                    }
                    continue;
                }
                Err(FrameBindError::IllegalState { .. }) if self.stop.is_stopped() => break,
                Err(e) => return Err(e),
            };

            report.frames_received += 1;
            if !frame.verify() {
                report.checksum_mismatches += 1;
                warn!("{}: checksum mismatch on frame #{}", self.channel, frame.info().sequence);
            }

            let eos = frame.is_eos();
            let len = frame.payload().len() as u64;
            let written = self.sink.write(frame.payload());
            self.system.release_frame(self.channel, frame)?;
            written?;
            report.bytes_written += len;

            if eos {
                self.sink.finish()?;
                report.reached_eos = true;
                info!("{}: consumer reached end of stream", self.channel);
                break;
            }
        }

        info!("{}: consumer exiting, {} frames received", self.channel, report.frames_received);
        Ok(report)
    }
}
