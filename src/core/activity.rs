//! Activity classification and the adaptive sampling policy.

use crate::collector::types::ActivityReading;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// What the user is currently doing, as far as the classifier can tell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityState {
    Stationary,
    Walking,
    Running,
    #[default]
    Unknown,
}

impl ActivityState {
    /// Every state, in table order.
    pub const ALL: [ActivityState; 4] = [
        ActivityState::Stationary,
        ActivityState::Walking,
        ActivityState::Running,
        ActivityState::Unknown,
    ];

    /// Resolve a raw reading into a single state.
    ///
    /// Priority when several flags are set: Running > Walking > Stationary >
    /// Unknown. Returns `None` for a reading with no flag set.
    pub fn classify(reading: &ActivityReading) -> Option<Self> {
        if reading.running {
            Some(ActivityState::Running)
        } else if reading.walking {
            Some(ActivityState::Walking)
        } else if reading.stationary {
            Some(ActivityState::Stationary)
        } else if reading.unknown {
            Some(ActivityState::Unknown)
        } else {
            None
        }
    }

    /// Sampling interval to request from the classifier while in this state.
    ///
    /// Faster motion gets finer sampling; stillness is sampled coarsely to
    /// save power.
    pub fn poll_interval(self) -> Duration {
        match self {
            ActivityState::Stationary => Duration::from_secs(30),
            ActivityState::Walking => Duration::from_secs(5),
            ActivityState::Running => Duration::from_secs(1),
            ActivityState::Unknown => Duration::from_secs(10),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActivityState::Stationary => "stationary",
            ActivityState::Walking => "walking",
            ActivityState::Running => "running",
            ActivityState::Unknown => "unknown",
        }
    }

    pub fn is_moving(self) -> bool {
        matches!(self, ActivityState::Walking | ActivityState::Running)
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
