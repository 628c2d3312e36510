//! Milestone and inactivity decisions.
//!
//! Pure functions over percentages and minutes; the engine owns the state
//! they are evaluated against.

use chrono::{DateTime, Utc};
use std::num::NonZeroU32;

/// Progress milestones, in the order they must be reached.
pub const MILESTONES: [u8; 4] = [25, 50, 75, 100];

/// The milestone that means the goal is met.
pub const GOAL_MILESTONE: u8 = 100;

/// `floor(100 * steps / goal)`.
pub fn percent_of_goal(steps: u64, goal: NonZeroU32) -> u64 {
    steps.saturating_mul(100) / u64::from(goal.get())
}

/// The first milestone crossed by moving from `old_percent` to `new_percent`
/// that has not been reached yet today.
///
/// Only one milestone is ever returned, even when the jump skips several.
pub fn next_crossed_milestone(old_percent: u64, new_percent: u64, last_reached: u8) -> Option<u8> {
    MILESTONES.iter().copied().find(|&milestone| {
        let threshold = u64::from(milestone);
        new_percent >= threshold && old_percent < threshold && last_reached < milestone
    })
}

/// Whole minutes of stillness between `since` and `now`.
pub fn inactive_minutes(since: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let minutes = (now - since).num_minutes().max(0);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// A reminder is due at every exact multiple of the threshold.
pub fn reminder_due(minutes: u32, threshold: NonZeroU32) -> bool {
    let threshold = threshold.get();
    minutes >= threshold && minutes % threshold == 0
}

/// Notification key for a milestone. Stable within a day so the sink can
/// dedupe repeated enqueues.
pub fn milestone_key(milestone: u8) -> String {
    format!("milestone-{milestone}")
}

/// Notification key for an inactivity reminder. Unique per firing.
pub fn reminder_key(now: DateTime<Utc>) -> String {
    format!("inactivity-{}", now.timestamp())
}

/// Title and body for a milestone notification.
pub fn milestone_copy(milestone: u8, steps: u64, goal: NonZeroU32) -> (String, String) {
    if milestone >= GOAL_MILESTONE {
        (
            "Goal reached!".to_string(),
            format!("You hit your goal of {} steps today.", goal.get()),
        )
    } else {
        let remaining = u64::from(goal.get()).saturating_sub(steps);
        (
            format!("{milestone}% of your step goal"),
            format!("{steps} steps so far, {remaining} to go."),
        )
    }
}

/// Title and body for an inactivity reminder.
pub fn reminder_copy(minutes: u32) -> (String, String) {
    (
        "Time to move".to_string(),
        format!("You've been still for {minutes} minutes. A short walk helps."),
    )
}
