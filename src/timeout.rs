//! Millisecond timeout conventions
//!
//! Every blocking call takes an `i32` millisecond timeout: negative waits
//! indefinitely, zero polls once, positive waits at most that long. Indefinite
//! waits are still carried out as a series of finite slices so that closed
//! queues and destroyed pools are noticed.

use std::time::{Duration, Instant};

/// Decoded form of an `i32` millisecond timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Return immediately if the operation cannot complete
    NonBlocking,
    /// Wait at most this long
    Timeout(Duration),
    /// Wait until the operation completes
    Forever,
}

impl WaitMode {
    pub fn from_millis(timeout_ms: i32) -> Self {
        match timeout_ms {
            ms if ms < 0 => WaitMode::Forever,
            0 => WaitMode::NonBlocking,
            ms => WaitMode::Timeout(Duration::from_millis(ms as u64)),
        }
    }

    /// Back to the `i32` convention, for error reporting
    pub fn as_millis(&self) -> i32 {
        match self {
            WaitMode::NonBlocking => 0,
            WaitMode::Timeout(d) => d.as_millis().min(i32::MAX as u128) as i32,
            WaitMode::Forever => -1,
        }
    }

    pub fn is_blocking(&self) -> bool {
        !matches!(self, WaitMode::NonBlocking)
    }
}

/// Tracks how much of a wait budget is left
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    mode: WaitMode,
    start: Instant,
}

impl Deadline {
    pub(crate) fn new(mode: WaitMode) -> Self {
        Self {
            mode,
            start: Instant::now(),
        }
    }

    /// Length of the next wait slice, or `None` once the budget is spent
    pub(crate) fn next_slice(&self, poll: Duration) -> Option<Duration> {
        match self.mode {
            WaitMode::NonBlocking => None,
            WaitMode::Forever => Some(poll),
            WaitMode::Timeout(limit) => {
                let elapsed = self.start.elapsed();
                if elapsed >= limit {
                    None
                } else {
                    Some((limit - elapsed).min(poll))
                }
            }
        }
    }

    pub(crate) fn mode(&self) -> WaitMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millisecond_convention() {
        assert_eq!(WaitMode::from_millis(-1), WaitMode::Forever);
        assert_eq!(WaitMode::from_millis(0), WaitMode::NonBlocking);
        assert_eq!(
            WaitMode::from_millis(20),
            WaitMode::Timeout(Duration::from_millis(20))
        );
        assert_eq!(WaitMode::from_millis(20).as_millis(), 20);
    }

    #[test]
    fn test_deadline_slices() {
        let poll = Duration::from_millis(50);
        assert!(Deadline::new(WaitMode::NonBlocking).next_slice(poll).is_none());
        assert_eq!(Deadline::new(WaitMode::Forever).next_slice(poll), Some(poll));

        let short = Deadline::new(WaitMode::Timeout(Duration::from_millis(10)));
        let slice = short.next_slice(poll).unwrap();
        assert!(slice <= Duration::from_millis(10));

        std::thread::sleep(Duration::from_millis(15));
        assert!(short.next_slice(poll).is_none());
    }
}
