//! Core functionality for the coach.
//!
//! This module contains:
//! - Activity classification and the adaptive sampling policy
//! - Milestone and inactivity decisions
//! - The observable snapshot and the engine that owns it

pub mod activity;
pub mod engine;
pub mod snapshot;
pub mod triggers;

// Re-export commonly used types
pub use activity::ActivityState;
pub use engine::{
    Collaborators, EngagementEngine, EngineSettings, CELEBRATION_WINDOW, DEFAULT_TICK_PERIOD,
    OBSERVER_CAPACITY,
};
pub use snapshot::EngagementSnapshot;
pub use triggers::{percent_of_goal, GOAL_MILESTONE, MILESTONES};
