//! Channel lifecycle

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChannelState {
    Unconfigured,
    Created,
    Started,
    Stopped,
    Destroyed,
}

impl ChannelState {
    /// State that must precede `self`
    pub fn predecessor(&self) -> Option<ChannelState> {
        match self {
            ChannelState::Unconfigured => None,
            ChannelState::Created => Some(ChannelState::Unconfigured),
            ChannelState::Started => Some(ChannelState::Created),
            ChannelState::Stopped => Some(ChannelState::Started),
            ChannelState::Destroyed => Some(ChannelState::Stopped),
        }
    }

    pub fn can_transition_to(&self, next: ChannelState) -> bool {
        next.predecessor() == Some(*self)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChannelState::Unconfigured => "unconfigured",
            ChannelState::Created => "created",
            ChannelState::Started => "started",
            ChannelState::Stopped => "stopped",
            ChannelState::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
