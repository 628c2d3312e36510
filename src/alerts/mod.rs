//! Outbound alert sinks.
//!
//! The engine fires and forgets: it never waits on a sink and never retries.
//! Deduplication and presentation are the sink's concern.

pub mod console;

use serde::{Deserialize, Serialize};

pub use console::{ConsoleHaptics, ConsoleNotifier, FixedAuthorizer};

/// Discrete haptic feedback patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HapticPattern {
    /// Monitoring started
    Start,
    /// Monitoring stopped
    Stop,
    /// Double pulse, reserved for reaching the goal
    Success,
    /// Single pulse for intermediate milestones and reminders
    Notification,
}

/// A user-facing notification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Identifier the sink may use to collapse duplicates
    pub key: String,
    pub title: String,
    pub body: String,
}

pub trait NotificationSink: Send {
    fn enqueue(&mut self, notification: Notification);

    /// The engine's daily counters were reset. Keys are only unique within a
    /// day, so any per-key dedup state should be dropped here.
    fn start_new_day(&mut self) {}
}

pub trait HapticSink: Send {
    fn play(&mut self, pattern: HapticPattern);
}

/// Asks the platform whether notifications may be shown.
///
/// May block (it usually waits on a system prompt), so the engine runs it on
/// its own thread.
pub trait NotificationAuthorizer: Send + 'static {
    fn request_authorization(&self) -> bool;
}
