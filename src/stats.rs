//! In-memory counters for the current coaching session.
//!
//! Nothing here is persisted: the coach keeps no history across days.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Counters for what the engine saw and did during a session.
#[derive(Debug)]
pub struct SessionStats {
    session_id: Uuid,
    session_start: DateTime<Utc>,
    /// Classifier readings handled
    classifier_events: AtomicU64,
    /// Step samples handled
    step_events: AtomicU64,
    /// Inactivity ticks handled
    ticks: AtomicU64,
    /// Malformed or empty payloads dropped
    ignored_events: AtomicU64,
    /// Events that arrived outside their subscription
    stale_events: AtomicU64,
    /// Cumulative step count went backwards
    step_regressions: AtomicU64,
    celebrations: AtomicU64,
    reminders: AtomicU64,
    notifications_enqueued: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            session_start: Utc::now(),
            classifier_events: AtomicU64::new(0),
            step_events: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            ignored_events: AtomicU64::new(0),
            stale_events: AtomicU64::new(0),
            step_regressions: AtomicU64::new(0),
            celebrations: AtomicU64::new(0),
            reminders: AtomicU64::new(0),
            notifications_enqueued: AtomicU64::new(0),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn record_classifier_event(&self) {
        self.classifier_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_step_event(&self) {
        self.step_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored_event(&self) {
        self.ignored_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_event(&self) {
        self.stale_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_step_regression(&self) {
        self.step_regressions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_celebration(&self) {
        self.celebrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reminder(&self) {
        self.reminders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self) {
        self.notifications_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            session_id: self.session_id,
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
            classifier_events: self.classifier_events.load(Ordering::Relaxed),
            step_events: self.step_events.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            ignored_events: self.ignored_events.load(Ordering::Relaxed),
            stale_events: self.stale_events.load(Ordering::Relaxed),
            step_regressions: self.step_regressions.load(Ordering::Relaxed),
            celebrations: self.celebrations.load(Ordering::Relaxed),
            reminders: self.reminders.load(Ordering::Relaxed),
            notifications_enqueued: self.notifications_enqueued.load(Ordering::Relaxed),
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let mut summary = format!(
            "Session {}:\n\
             - Activity readings: {}\n\
             - Step updates: {}\n\
             - Inactivity ticks: {}\n\
             - Ignored payloads: {}\n\
             - Late events dropped: {}\n\
             - Milestones celebrated: {}\n\
             - Inactivity reminders: {}\n\
             - Notifications sent: {}\n\
             - Session duration: {} seconds",
            stats.session_id,
            stats.classifier_events,
            stats.step_events,
            stats.ticks,
            stats.ignored_events,
            stats.stale_events,
            stats.celebrations,
            stats.reminders,
            stats.notifications_enqueued,
            stats.session_duration_secs
        );
        if stats.step_regressions > 0 {
            summary.push_str(&format!(
                "\n - Step count went backwards {} time(s); check for a missed daily reset",
                stats.step_regressions
            ));
        }
        summary
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub session_id: Uuid,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
    pub classifier_events: u64,
    pub step_events: u64,
    pub ticks: u64,
    pub ignored_events: u64,
    pub stale_events: u64,
    pub step_regressions: u64,
    pub celebrations: u64,
    pub reminders: u64,
    pub notifications_enqueued: u64,
}

/// Thread-safe shared session stats.
pub type SharedStats = Arc<SessionStats>;

/// Create a new shared stats handle.
pub fn create_shared_stats() -> SharedStats {
    Arc::new(SessionStats::new())
}
