//! The engine's observable state.

use crate::core::activity::ActivityState;
use crate::core::triggers::percent_of_goal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::num::NonZeroU32;
use std::time::Duration;

/// Everything an observer can see about the coach at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementSnapshot {
    pub current_activity: ActivityState,
    /// Cumulative steps since local midnight
    pub steps: u64,
    pub step_goal: NonZeroU32,
    /// One of 0, 25, 50, 75, 100
    pub last_milestone_reached: u8,
    pub inactivity_minutes: u32,
    /// Set while stationary; cleared as soon as the user moves
    pub stationary_since: Option<DateTime<Utc>>,
    pub is_monitoring: bool,
    pub inactivity_alert_threshold_minutes: NonZeroU32,
    pub notifications_authorized: bool,
    /// True for a short window after a milestone celebration
    pub celebrating: bool,
    /// Sampling interval last requested from the classifier
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
}

impl EngagementSnapshot {
    pub fn new(step_goal: NonZeroU32, inactivity_alert_threshold_minutes: NonZeroU32) -> Self {
        let current_activity = ActivityState::default();
        Self {
            current_activity,
            steps: 0,
            step_goal,
            last_milestone_reached: 0,
            inactivity_minutes: 0,
            stationary_since: None,
            is_monitoring: false,
            inactivity_alert_threshold_minutes,
            notifications_authorized: false,
            celebrating: false,
            poll_interval: current_activity.poll_interval(),
        }
    }

    /// `steps / step_goal`. May exceed 1.0.
    pub fn progress(&self) -> f64 {
        self.steps as f64 / f64::from(self.step_goal.get())
    }

    /// Integer percentage used for milestone evaluation.
    pub fn percent(&self) -> u64 {
        percent_of_goal(self.steps, self.step_goal)
    }

    pub fn remaining_steps(&self) -> u64 {
        u64::from(self.step_goal.get()).saturating_sub(self.steps)
    }

    /// One-line human summary.
    pub fn status_line(&self) -> String {
        let mut line = format!(
            "{} | {}/{} steps ({}%) | poll {}s",
            self.current_activity,
            self.steps,
            self.step_goal,
            self.percent(),
            self.poll_interval.as_secs()
        );
        if self.stationary_since.is_some() {
            line.push_str(&format!(" | still {} min", self.inactivity_minutes));
        }
        if self.celebrating {
            line.push_str(" | celebrating");
        }
        line
    }
}

mod duration_secs {
    use serde::{Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }
}
