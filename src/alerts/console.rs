//! Terminal stand-ins for the platform notification and haptic services.

use crate::alerts::{HapticPattern, HapticSink, Notification, NotificationAuthorizer, NotificationSink};
use std::collections::HashSet;

/// Prints notifications to stdout, collapsing repeats of the same key within
/// a day the way a system notification center replaces a pending request.
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    seen_today: HashSet<String>,
    delivered: usize,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of notifications shown.
    pub fn delivered_count(&self) -> usize {
        self.delivered
    }
}

impl NotificationSink for ConsoleNotifier {
    fn enqueue(&mut self, notification: Notification) {
        if !self.seen_today.insert(notification.key.clone()) {
            tracing::debug!(key = %notification.key, "duplicate notification collapsed");
            return;
        }
        self.delivered += 1;
        println!("[notify] {}: {}", notification.title, notification.body);
    }

    fn start_new_day(&mut self) {
        self.seen_today.clear();
    }
}

/// Renders haptic patterns as text.
#[derive(Debug, Default)]
pub struct ConsoleHaptics;

impl ConsoleHaptics {
    pub fn new() -> Self {
        Self
    }
}

impl HapticSink for ConsoleHaptics {
    fn play(&mut self, pattern: HapticPattern) {
        let feel = match pattern {
            HapticPattern::Start => "start",
            HapticPattern::Stop => "stop",
            HapticPattern::Success => "bzz-bzz",
            HapticPattern::Notification => "bzz",
        };
        println!("[haptic] {feel}");
    }
}

/// Answers the authorization request with a fixed value (from config or a
/// CLI flag).
#[derive(Debug, Clone, Copy)]
pub struct FixedAuthorizer {
    granted: bool,
}

impl FixedAuthorizer {
    pub fn new(granted: bool) -> Self {
        Self { granted }
    }
}

impl NotificationAuthorizer for FixedAuthorizer {
    fn request_authorization(&self) -> bool {
        self.granted
    }
}
