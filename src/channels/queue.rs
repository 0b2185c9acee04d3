//! Bounded inbound frame queue

use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::{
    error::{FrameBindError, Result},
    frame::Frame,
    timeout::{Deadline, WaitMode},
};

use super::id::ChannelId;

/// Why a push did not take the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushFailure {
    /// Queue at depth; waiting may help
    Full,
    /// Queue is not accepting frames
    Closed,
    /// Receive budget spent
    BudgetSpent(u64),
}

#[derive(Debug)]
struct QueueState {
    frames: VecDeque<Frame>,
    open: bool,
    accepted: u64,
    budget: Option<u64>,
}

/// FIFO of frames waiting for one channel's reader
///
/// Created closed; `open` activates it once the channel starts, `close`
/// refuses new frames while leaving queued ones drainable.
#[derive(Debug)]
pub(crate) struct FrameQueue {
    channel: ChannelId,
    capacity: usize,
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl FrameQueue {
    pub(crate) fn new(channel: ChannelId, capacity: usize) -> Self {
        Self {
            channel,
            capacity,
            state: Mutex::new(QueueState {
                frames: VecDeque::with_capacity(capacity),
                open: false,
                accepted: 0,
                budget: None,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Start accepting, at most `budget` frames when set
    pub(crate) fn open(&self, budget: Option<u64>) {
        let mut state = self.lock();
        state.open = true;
        state.accepted = 0;
        state.budget = budget;
    }

    /// Stop accepting and wake every waiter
    pub(crate) fn close(&self) {
        self.lock().open = false;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Enqueue without waiting; hands the frame back on failure
    pub(crate) fn try_push(&self, frame: Frame) -> std::result::Result<(), (Frame, PushFailure)> {
        let mut state = self.lock();
        if !state.open {
            return Err((frame, PushFailure::Closed));
        }
        if let Some(budget) = state.budget {
            if state.accepted >= budget {
                return Err((frame, PushFailure::BudgetSpent(budget)));
            }
        }
        if state.frames.len() >= self.capacity {
            return Err((frame, PushFailure::Full));
        }

        state.frames.push_back(frame);
        state.accepted += 1;
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Wait up to `slice` for free space; returns early if already available or closed
    pub(crate) fn wait_for_space(&self, slice: Duration) {
        let state = self.lock();
        if state.frames.len() < self.capacity || !state.open {
            return;
        }
        let _ = self
            .not_full
            .wait_timeout(state, slice)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Dequeue the oldest frame
    ///
    /// `Timeout` when nothing arrives in time; `IllegalState` once the queue
    /// is closed and drained.
    pub(crate) fn pop(&self, mode: WaitMode, poll: Duration) -> Result<Frame> {
        let deadline = Deadline::new(mode);
        let mut state = self.lock();

        loop {
            if let Some(frame) = state.frames.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Ok(frame);
            }

            if !state.open {
                return Err(FrameBindError::illegal_state(
                    self.channel,
                    "Channel is not receiving and has no pending frames",
                ));
            }

            let slice = match deadline.next_slice(poll) {
                Some(slice) => slice,
                None => {
                    return Err(FrameBindError::timeout(
                        format!("get_frame on {}", self.channel),
                        mode.as_millis(),
                    ))
                }
            };

            state = self
                .not_empty
                .wait_timeout(state, slice)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Remove every queued frame
    pub(crate) fn drain(&self) -> Vec<Frame> {
        let frames: Vec<Frame> = self.lock().frames.drain(..).collect();
        self.not_full.notify_all();
        frames
    }
}
