//! Adapters for sensors that are absent or disabled.
//!
//! The engine checks `is_available` and never subscribes these, leaving the
//! corresponding part of the snapshot at its defaults.

use crate::collector::{ActivityClassifier, AdapterError, EventSender, StepCounter};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A classifier that does not exist.
#[derive(Debug, Clone, Default)]
pub struct UnavailableClassifier {
    reason: String,
}

impl UnavailableClassifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ActivityClassifier for UnavailableClassifier {
    fn is_available(&self) -> bool {
        false
    }

    fn subscribe(&mut self, _events: EventSender) -> Result<(), AdapterError> {
        Err(AdapterError::Unavailable(self.reason.clone()))
    }

    fn unsubscribe(&mut self) {}

    fn set_sampling_interval(&mut self, _interval: Duration) {}
}

/// A step counter that does not exist.
#[derive(Debug, Clone, Default)]
pub struct UnavailableStepCounter {
    reason: String,
}

impl UnavailableStepCounter {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl StepCounter for UnavailableStepCounter {
    fn is_available(&self) -> bool {
        false
    }

    fn subscribe(
        &mut self,
        _since: DateTime<Utc>,
        _events: EventSender,
    ) -> Result<(), AdapterError> {
        Err(AdapterError::Unavailable(self.reason.clone()))
    }

    fn unsubscribe(&mut self) {}
}
