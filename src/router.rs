//! Frame delivery along the bind graph
//!
//! A send resolves its route under the graph's read lock and enqueues while
//! still holding it. When the target queue is full the lock is dropped, the
//! sender waits for space for one poll slice, and the route is resolved again
//! so that a concurrent unbind or rebind takes effect for the retry.

use std::{error::Error, fmt, sync::Arc, time::Duration};

use log::{debug, trace};

use crate::{
    bind::BindGraph,
    channels::{queue::PushFailure, registry::ChannelEntry, ChannelId, ChannelRegistry, ChannelState},
    error::{FrameBindError, Result},
    frame::Frame,
    timeout::{Deadline, WaitMode},
};

/// A frame the router refused, handed back to the caller with the reason
pub struct Rejected {
    frame: Frame,
    error: FrameBindError,
}

impl Rejected {
    pub(crate) fn new(frame: Frame, error: FrameBindError) -> Self {
        Self { frame, error }
    }

    pub fn error(&self) -> &FrameBindError {
        &self.error
    }

    /// Whether resending the same frame later may succeed
    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Take the frame back for a retry
    pub fn into_frame(self) -> Frame {
        self.frame
    }

    pub fn into_parts(self) -> (Frame, FrameBindError) {
        (self.frame, self.error)
    }
}

impl fmt::Debug for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("sequence", &self.frame.info().sequence)
            .field("error", &self.error)
            .finish()
    }
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame #{} rejected: {}", self.frame.info().sequence, self.error)
    }
}

impl Error for Rejected {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

impl From<Rejected> for FrameBindError {
    fn from(rejected: Rejected) -> Self {
        rejected.error
    }
}

/// Sends, receives and releases frames on behalf of channels
#[derive(Debug, Clone)]
pub struct FrameRouter {
    registry: Arc<ChannelRegistry>,
    graph: Arc<BindGraph>,
    poll_interval: Duration,
}

impl FrameRouter {
    pub fn new(registry: Arc<ChannelRegistry>, graph: Arc<BindGraph>, poll_interval: Duration) -> Self {
        Self {
            registry,
            graph,
            poll_interval,
        }
    }

    /// Deliver `frame` from `src` to its bound destination, or to `src`'s own
    /// queue when unbound
    ///
    /// A full queue is waited on for up to `timeout_ms`. Expiry reports
    /// `Busy` for a zero timeout and `Timeout` otherwise. Every failure hands
    /// the frame back inside [`Rejected`].
    pub fn send_frame(&self, src: ChannelId, frame: Frame, timeout_ms: i32) -> std::result::Result<(), Rejected> {
        if frame.buffer().is_dirty() {
            let handle = frame.buffer().handle();
            return Err(Rejected::new(
                frame,
                FrameBindError::Unflushed {
                    pool: handle.pool,
                    block: handle.index as usize,
                },
            ));
        }

        let mode = WaitMode::from_millis(timeout_ms);
        let deadline = Deadline::new(mode);
        let mut frame = frame;

        loop {
            let target = {
                let edges = self.graph.read_edges();
                let source = match self.sending_entry(src) {
                    Ok(entry) => entry,
                    Err(e) => return Err(Rejected::new(frame, e)),
                };

                let target = match edges.get(&src) {
                    Some(dst) => match self.receiving_entry(*dst) {
                        Ok(entry) => entry,
                        Err(e) => {
                            source.stats.record_rejected();
                            return Err(Rejected::new(frame, e));
                        }
                    },
                    None => Arc::clone(&source),
                };

                match target.queue.try_push(frame) {
                    Ok(()) => {
                        target.stats.record_accepted();
                        trace!("{} -> {}", src, target.id);
                        return Ok(());
                    }
                    Err((returned, PushFailure::Full)) => {
                        frame = returned;
                        target
                    }
                    Err((returned, failure)) => {
                        source.stats.record_rejected();
                        let message = match failure {
                            PushFailure::BudgetSpent(budget) => {
                                format!("Receive budget of {} frames is spent", budget)
                            }
                            _ => "Channel is not accepting frames".to_string(),
                        };
                        return Err(Rejected::new(
                            returned,
                            FrameBindError::illegal_state(target.id, message),
                        ));
                    }
                }
            };

            let slice = match deadline.next_slice(self.poll_interval) {
                Some(slice) => slice,
                None => {
                    if let Ok(source) = self.registry.entry(src) {
                        source.stats.record_rejected();
                    }
                    let error = match mode {
                        WaitMode::NonBlocking => {
                            FrameBindError::busy(format!("queue of {} is full", target.id))
                        }
                        _ => FrameBindError::timeout(format!("send_frame from {}", src), timeout_ms),
                    };
                    debug!("send from {} gave up: {}", src, error);
                    return Err(Rejected::new(frame, error));
                }
            };

            target.queue.wait_for_space(slice);
        }
    }

    fn sending_entry(&self, src: ChannelId) -> Result<Arc<ChannelEntry>> {
        let entry = self.registry.entry(src)?;
        match entry.state() {
            ChannelState::Started => Ok(entry),
            state => Err(FrameBindError::illegal_state(
                src,
                format!("Cannot send from a {} channel", state),
            )),
        }
    }

    fn receiving_entry(&self, dst: ChannelId) -> Result<Arc<ChannelEntry>> {
        let entry = self.registry.entry(dst)?;
        match entry.state() {
            ChannelState::Started => Ok(entry),
            state => Err(FrameBindError::illegal_state(
                dst,
                format!("Bound destination is {}", state),
            )),
        }
    }

    /// Take the next frame queued at `dst`
    ///
    /// `Timeout` when none arrives within `timeout_ms`. A stopped channel
    /// still hands out its pending frames, then reports `IllegalState`.
    pub fn get_frame(&self, dst: ChannelId, timeout_ms: i32) -> Result<Frame> {
        let entry = self.registry.entry(dst)?;
        if entry.state() == ChannelState::Created {
            return Err(FrameBindError::illegal_state(dst, "Channel has not started receiving"));
        }

        let mut frame = entry
            .queue
            .pop(WaitMode::from_millis(timeout_ms), self.poll_interval)?;
        frame.set_delivered_by(dst);
        entry.stats.record_delivered();
        Ok(frame)
    }

    /// Return a frame obtained from `get_frame(dst, ..)`
    ///
    /// A frame delivered by another channel is handed back with
    /// `InvalidArgument`.
    pub fn release_frame(&self, dst: ChannelId, frame: Frame) -> std::result::Result<(), Rejected> {
        if frame.delivered_by() != Some(dst) {
            let message = match frame.delivered_by() {
                Some(owner) => format!("Frame was delivered by {}, not {}", owner, dst),
                None => format!("Frame was never delivered by {}", dst),
            };
            return Err(Rejected::new(frame, FrameBindError::invalid_argument("frame", message)));
        }

        if let Ok(entry) = self.registry.entry(dst) {
            entry.stats.record_released();
        }
        if let Err(e) = frame.into_buffer().release() {
            // Only reachable if the block's count was corrupted through a raw handle
            debug!("release on {} reported {}", dst, e);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
