//! The engagement engine.
//!
//! A single-owner state machine. Adapters run on their own threads and push
//! events into a bounded inbox; whoever owns the engine drains it with
//! [`EngagementEngine::pump`] or [`EngagementEngine::process_pending`], so
//! every handler runs to completion before the next one starts.
//!
//! Each `start` opens a new subscription epoch. Events are tagged with the
//! epoch they were sent under and anything from an older epoch is dropped,
//! which keeps late deliveries from a stopped subscription out of the state.

use crate::alerts::{
    HapticPattern, HapticSink, Notification, NotificationAuthorizer, NotificationSink,
};
use crate::clock::{start_of_day, Clock, TimerHandle, TimerSource};
use crate::collector::{
    ActivityClassifier, ActivityReading, EngineEvent, Envelope, EventSender, StepCounter,
    StepSample,
};
use crate::core::activity::ActivityState;
use crate::core::snapshot::EngagementSnapshot;
use crate::core::triggers::{
    inactive_minutes, milestone_copy, milestone_key, next_crossed_milestone, percent_of_goal,
    reminder_copy, reminder_due, reminder_key, GOAL_MILESTONE,
};
use crate::stats::{create_shared_stats, SharedStats};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long the celebrating flag stays up after a milestone.
pub const CELEBRATION_WINDOW: Duration = Duration::from_secs(2);

/// Default period of the inactivity tick.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(60);

const INBOX_CAPACITY: usize = 1024;

/// Snapshots buffered per observer before new ones are dropped.
pub const OBSERVER_CAPACITY: usize = 256;

/// User settings the engine starts from.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub step_goal: NonZeroU32,
    pub inactivity_alert_threshold: NonZeroU32,
    pub tick_period: Duration,
    /// Zone that defines "today" for the step feed
    pub timezone: Tz,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            step_goal: NonZeroU32::new(10_000).unwrap_or(NonZeroU32::MIN),
            inactivity_alert_threshold: NonZeroU32::new(60).unwrap_or(NonZeroU32::MIN),
            tick_period: DEFAULT_TICK_PERIOD,
            timezone: chrono_tz::UTC,
        }
    }
}

/// The engine's external collaborators.
pub struct Collaborators {
    pub classifier: Box<dyn ActivityClassifier>,
    pub step_counter: Box<dyn StepCounter>,
    pub timer: Box<dyn TimerSource>,
    pub clock: Arc<dyn Clock>,
    pub notifications: Box<dyn NotificationSink>,
    pub haptics: Box<dyn HapticSink>,
}

/// Tracks progress toward the step goal and decides when to alert.
pub struct EngagementEngine {
    state: EngagementSnapshot,
    tick_period: Duration,
    timezone: Tz,
    celebrating_until: Option<DateTime<Utc>>,
    /// Minute mark of the last inactivity reminder in the current still spell
    last_reminder_minute: Option<u32>,
    collab: Collaborators,
    timer_handle: Option<TimerHandle>,
    inbox_tx: Sender<Envelope>,
    inbox_rx: Receiver<Envelope>,
    epoch: u64,
    observers: Vec<Sender<EngagementSnapshot>>,
    stats: SharedStats,
}

impl EngagementEngine {
    pub fn new(settings: EngineSettings, collab: Collaborators) -> Self {
        let (inbox_tx, inbox_rx) = bounded(INBOX_CAPACITY);
        Self {
            state: EngagementSnapshot::new(settings.step_goal, settings.inactivity_alert_threshold),
            tick_period: settings.tick_period,
            timezone: settings.timezone,
            celebrating_until: None,
            last_reminder_minute: None,
            collab,
            timer_handle: None,
            inbox_tx,
            inbox_rx,
            epoch: 0,
            observers: Vec::new(),
            stats: create_shared_stats(),
        }
    }

    pub fn snapshot(&self) -> &EngagementSnapshot {
        &self.state
    }

    pub fn stats(&self) -> SharedStats {
        Arc::clone(&self.stats)
    }

    pub fn is_monitoring(&self) -> bool {
        self.state.is_monitoring
    }

    /// Receive a copy of the snapshot after every state change.
    ///
    /// Each observer buffers at most [`OBSERVER_CAPACITY`] snapshots; while
    /// its buffer is full further snapshots are dropped for that observer.
    pub fn subscribe(&mut self) -> Receiver<EngagementSnapshot> {
        let (tx, rx) = bounded(OBSERVER_CAPACITY);
        self.observers.push(tx);
        rx
    }

    /// A sender for the current subscription epoch.
    ///
    /// Events sent through it are dropped once the engine is stopped or
    /// restarted.
    pub fn event_sender(&self) -> EventSender {
        EventSender::new(self.inbox_tx.clone(), self.epoch)
    }

    pub fn set_step_goal(&mut self, goal: NonZeroU32) {
        if self.state.step_goal != goal {
            info!(goal = goal.get(), "step goal changed");
            self.state.step_goal = goal;
            self.publish();
        }
    }

    pub fn set_inactivity_threshold(&mut self, minutes: NonZeroU32) {
        if self.state.inactivity_alert_threshold_minutes != minutes {
            info!(minutes = minutes.get(), "inactivity threshold changed");
            self.state.inactivity_alert_threshold_minutes = minutes;
            self.publish();
        }
    }

    pub fn set_notifications_authorized(&mut self, granted: bool) {
        if self.state.notifications_authorized != granted {
            info!(granted, "notification authorization updated");
            self.state.notifications_authorized = granted;
            self.publish();
        }
    }

    /// Ask for notification permission on a background thread. The answer
    /// arrives through the inbox like any other event.
    pub fn request_notification_authorization<A: NotificationAuthorizer>(&self, authorizer: A) {
        let events = self.event_sender();
        thread::spawn(move || {
            let granted = authorizer.request_authorization();
            events.send(EngineEvent::AuthorizationResolved(granted));
        });
    }

    /// Begin monitoring. No-op if already monitoring.
    pub fn start(&mut self) {
        if self.state.is_monitoring {
            return;
        }

        self.epoch += 1;
        let events = self.event_sender();
        self.state.is_monitoring = true;

        let interval = self.state.current_activity.poll_interval();
        self.state.poll_interval = interval;

        if self.collab.classifier.is_available() {
            self.collab.classifier.set_sampling_interval(interval);
            if let Err(e) = self.collab.classifier.subscribe(events.clone()) {
                warn!(error = %e, "activity classifier subscribe failed, continuing without it");
            }
        } else {
            info!("activity classifier unavailable, continuing without motion updates");
        }

        if self.collab.step_counter.is_available() {
            let since = start_of_day(self.collab.clock.now(), self.timezone);
            if let Err(e) = self.collab.step_counter.subscribe(since, events.clone()) {
                warn!(error = %e, "step counter subscribe failed, continuing without it");
            }
        } else {
            info!("step counter unavailable, continuing without step updates");
        }

        self.timer_handle = Some(self.collab.timer.schedule_repeating(self.tick_period, events));
        self.collab.haptics.play(HapticPattern::Start);
        info!(epoch = self.epoch, "monitoring started");
        self.publish();
    }

    /// Stop monitoring. No-op if idle.
    ///
    /// Adapters and the timer are torn down before this returns, and the epoch
    /// moves on so anything still queued is discarded. The current still
    /// spell ends here: the user may move while nobody is watching.
    pub fn stop(&mut self) {
        if !self.state.is_monitoring {
            return;
        }

        self.detach();
        self.state.is_monitoring = false;
        self.clear_stillness();
        self.collab.haptics.play(HapticPattern::Stop);
        info!(epoch = self.epoch, "monitoring stopped");
        self.publish();
    }

    /// Clear the day's counters. Leaves monitoring and settings alone.
    pub fn reset_daily(&mut self) {
        self.state.steps = 0;
        self.state.last_milestone_reached = 0;
        self.clear_stillness();
        self.collab.notifications.start_new_day();
        info!("daily counters reset");
        self.publish();
    }

    /// Wait up to `timeout` for one event, then handle everything queued.
    /// Returns the number of events dispatched.
    pub fn pump(&mut self, timeout: Duration) -> usize {
        let mut handled = 0;
        match self.inbox_rx.recv_timeout(timeout) {
            Ok(envelope) => {
                self.dispatch(envelope);
                handled += 1;
            }
            // The engine holds a sender itself, so the inbox never disconnects.
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        }
        handled += self.process_pending();

        let now = self.collab.clock.now();
        self.expire_celebration(now);
        handled
    }

    /// Handle everything currently queued without waiting.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let envelope = match self.inbox_rx.try_recv() {
                Ok(envelope) => envelope,
                Err(_) => break,
            };
            self.dispatch(envelope);
            handled += 1;
        }
        handled
    }

    fn dispatch(&mut self, envelope: Envelope) {
        if let EngineEvent::AuthorizationResolved(granted) = envelope.event {
            self.set_notifications_authorized(granted);
            return;
        }

        if envelope.epoch != self.epoch || !self.state.is_monitoring {
            self.stats.record_stale_event();
            debug!(
                event_epoch = envelope.epoch,
                epoch = self.epoch,
                "dropping event from an inactive subscription"
            );
            return;
        }

        match envelope.event {
            EngineEvent::Activity(reading) => self.handle_activity(reading),
            EngineEvent::Steps(sample) => self.handle_steps(sample),
            EngineEvent::Tick => self.handle_tick(),
            EngineEvent::AuthorizationResolved(_) => {}
        }
    }

    /// Apply a classifier reading.
    pub fn handle_activity(&mut self, reading: ActivityReading) {
        if !self.state.is_monitoring {
            self.stats.record_stale_event();
            return;
        }
        self.stats.record_classifier_event();

        let Some(activity) = ActivityState::classify(&reading) else {
            self.stats.record_ignored_event();
            debug!("ignoring empty activity reading");
            return;
        };

        let previous = self.state.current_activity;
        if activity == ActivityState::Stationary {
            // After a daily reset the spell restarts at the next still reading.
            if self.state.stationary_since.is_none() {
                self.state.stationary_since = Some(self.collab.clock.now());
            }
        } else {
            self.clear_stillness();
        }
        self.state.current_activity = activity;

        let interval = activity.poll_interval();
        self.state.poll_interval = interval;
        self.collab.classifier.set_sampling_interval(interval);

        if previous != activity {
            debug!(from = %previous, to = %activity, ?interval, "activity changed");
        }
        self.publish();
    }

    /// Apply a step counter sample.
    pub fn handle_steps(&mut self, sample: StepSample) {
        if !self.state.is_monitoring {
            self.stats.record_stale_event();
            return;
        }
        self.stats.record_step_event();

        let steps = match sample {
            StepSample::Count(count) => match u64::try_from(count) {
                Ok(steps) => steps,
                Err(_) => {
                    self.stats.record_ignored_event();
                    debug!(count, "ignoring negative step count");
                    return;
                }
            },
            StepSample::Failed(reason) => {
                self.stats.record_ignored_event();
                debug!(%reason, "step counter reported an error");
                return;
            }
        };

        let goal = self.state.step_goal;
        let old_percent = percent_of_goal(self.state.steps, goal);
        if steps < self.state.steps {
            self.stats.record_step_regression();
            warn!(
                previous = self.state.steps,
                reported = steps,
                "step count went backwards, taking it as a new baseline"
            );
        }
        self.state.steps = steps;
        let new_percent = percent_of_goal(steps, goal);

        if let Some(milestone) =
            next_crossed_milestone(old_percent, new_percent, self.state.last_milestone_reached)
        {
            self.state.last_milestone_reached = milestone;
            self.celebrate(milestone);
        }
        self.publish();
    }

    /// Periodic inactivity check.
    pub fn handle_tick(&mut self) {
        if !self.state.is_monitoring {
            self.stats.record_stale_event();
            return;
        }
        self.stats.record_tick();

        let now = self.collab.clock.now();
        self.expire_celebration(now);

        let Some(since) = self.state.stationary_since else {
            return;
        };
        let minutes = inactive_minutes(since, now);
        self.state.inactivity_minutes = minutes;

        if reminder_due(minutes, self.state.inactivity_alert_threshold_minutes)
            && self.last_reminder_minute != Some(minutes)
        {
            self.last_reminder_minute = Some(minutes);
            self.remind(minutes, now);
        }
        self.publish();
    }

    fn celebrate(&mut self, milestone: u8) {
        let pattern = if milestone >= GOAL_MILESTONE {
            HapticPattern::Success
        } else {
            HapticPattern::Notification
        };
        self.collab.haptics.play(pattern);

        let now = self.collab.clock.now();
        let window = chrono::Duration::from_std(CELEBRATION_WINDOW)
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.celebrating_until = Some(now + window);
        self.state.celebrating = true;
        self.stats.record_celebration();
        info!(milestone, steps = self.state.steps, "milestone reached");

        if self.state.notifications_authorized {
            let (title, body) = milestone_copy(milestone, self.state.steps, self.state.step_goal);
            self.collab.notifications.enqueue(Notification {
                key: milestone_key(milestone),
                title,
                body,
            });
            self.stats.record_notification();
        }
    }

    fn remind(&mut self, minutes: u32, now: DateTime<Utc>) {
        self.stats.record_reminder();
        if !self.state.notifications_authorized {
            debug!(minutes, "inactivity reminder due but notifications are not authorized");
            return;
        }

        info!(minutes, "inactivity reminder");
        let (title, body) = reminder_copy(minutes);
        self.collab.notifications.enqueue(Notification {
            key: reminder_key(now),
            title,
            body,
        });
        self.stats.record_notification();
        self.collab.haptics.play(HapticPattern::Notification);
    }

    fn expire_celebration(&mut self, now: DateTime<Utc>) {
        if let Some(until) = self.celebrating_until {
            if now >= until {
                self.celebrating_until = None;
                self.state.celebrating = false;
                self.publish();
            }
        }
    }

    fn clear_stillness(&mut self) {
        self.state.stationary_since = None;
        self.state.inactivity_minutes = 0;
        self.last_reminder_minute = None;
    }

    fn detach(&mut self) {
        self.collab.classifier.unsubscribe();
        self.collab.step_counter.unsubscribe();
        if let Some(handle) = self.timer_handle.take() {
            self.collab.timer.cancel(handle);
        }
        self.epoch += 1;
    }

    fn publish(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.state.clone();
        self.observers.retain(|tx| match tx.try_send(snapshot.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("observer is not draining, snapshot dropped");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

impl Drop for EngagementEngine {
    fn drop(&mut self) {
        if self.state.is_monitoring {
            self.detach();
        }
    }
}
