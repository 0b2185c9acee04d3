//! Send retry with fixed backoff

use std::{thread, time::Duration};

use log::trace;
use serde::{Deserialize, Serialize};

use crate::{
    channels::ChannelId,
    config::SystemConfig,
    error::Result,
    frame::Frame,
    system::MediaSystem,
};

use super::stop::StopSignal;

/// How a producer retries a send that hit backpressure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Per-attempt `send_frame` timeout
    pub send_timeout_ms: i32,
    /// Sleep between attempts
    pub backoff_ms: u64,
    /// Give up after this many attempts; `None` retries until stopped
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            send_timeout_ms: 20,
            backoff_ms: 10,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Default backoff with the system's send timeout per attempt
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            send_timeout_ms: config.send_timeout_ms,
            ..Self::default()
        }
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Result of a retried send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Delivered after `retries` refused attempts
    Sent { retries: u32 },
    /// Stop requested while retrying; the frame was released
    Stopped { retries: u32 },
}

/// Send `frame`, retrying `Busy`/`Timeout` with backoff until it is
/// accepted, `stop` is raised, or the attempt limit is hit
///
/// Non-retryable errors are returned at once and the frame is released.
pub fn send_with_retry(
    system: &MediaSystem,
    src: ChannelId,
    frame: Frame,
    policy: &RetryPolicy,
    stop: &StopSignal,
) -> Result<SendOutcome> {
    let mut frame = frame;
    let mut retries = 0u32;

    loop {
        let rejected = match system.send_frame(src, frame, policy.send_timeout_ms) {
            Ok(()) => return Ok(SendOutcome::Sent { retries }),
            Err(rejected) => rejected,
        };

        if !rejected.is_retryable() {
            return Err(rejected.into());
        }
        retries += 1;
        if let Some(max) = policy.max_attempts {
            if retries >= max {
                return Err(rejected.into());
            }
        }
        if stop.is_stopped() {
            return Ok(SendOutcome::Stopped { retries });
        }

        trace!("{}: retry {} after {}", src, retries, rejected.error());
        thread::sleep(policy.backoff());
        frame = rejected.into_frame();
    }
}
