//! Event types delivered by the sensor adapters.
//!
//! These types carry raw readings exactly as the adapters report them. Deciding
//! what a reading means (which activity wins, whether a count is usable) is
//! left to the engine.

use serde::{Deserialize, Serialize};

/// A raw motion classification.
///
/// Motion coprocessors may assert several flags in one reading (running
/// usually implies walking too); the engine resolves them by priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityReading {
    #[serde(default)]
    pub stationary: bool,
    #[serde(default)]
    pub walking: bool,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub unknown: bool,
}

impl ActivityReading {
    /// A reading asserting only the stationary flag.
    pub fn stationary() -> Self {
        Self {
            stationary: true,
            ..Self::default()
        }
    }

    /// A reading asserting only the walking flag.
    pub fn walking() -> Self {
        Self {
            walking: true,
            ..Self::default()
        }
    }

    /// A reading asserting only the running flag.
    pub fn running() -> Self {
        Self {
            running: true,
            ..Self::default()
        }
    }

    /// A reading where the classifier could not decide.
    pub fn unknown() -> Self {
        Self {
            unknown: true,
            ..Self::default()
        }
    }

    /// True when no flag at all is set.
    pub fn is_empty(&self) -> bool {
        !(self.stationary || self.walking || self.running || self.unknown)
    }
}

/// One reading from the step counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepSample {
    /// Cumulative steps since local midnight.
    Count(i64),
    /// The pedometer reported an error. Retrying is the adapter's job.
    Failed(String),
}

/// Everything that can arrive in the engine's inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Activity(ActivityReading),
    Steps(StepSample),
    Tick,
    /// Result of the asynchronous notification permission request.
    AuthorizationResolved(bool),
}

/// An event tagged with the subscription epoch it was sent under.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub epoch: u64,
    pub event: EngineEvent,
}
