//! Deterministic collaborators for driving the engine without hardware or
//! wall-clock time.
//!
//! Every double is a cheap `Clone` over shared state, so a test can hand one
//! copy to the engine and keep another to drive or inspect it.

use crate::alerts::{HapticPattern, HapticSink, Notification, NotificationSink};
use crate::clock::{Clock, TimerHandle, TimerSource};
use crate::collector::{
    ActivityClassifier, ActivityReading, AdapterError, EngineEvent, EventSender, StepCounter,
    StepSample,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *lock(&self.now) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

#[derive(Debug, Default)]
struct ManualTimerState {
    next_id: u64,
    active: HashMap<u64, (Duration, EventSender)>,
    cancelled: usize,
}

/// A timer that ticks only when [`ManualTimer::fire`] is called.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<ManualTimerState>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send one tick from every active schedule. Returns how many were sent.
    pub fn fire(&self) -> usize {
        let state = lock(&self.state);
        state
            .active
            .values()
            .filter(|(_, events)| events.send(EngineEvent::Tick))
            .count()
    }

    pub fn active_count(&self) -> usize {
        lock(&self.state).active.len()
    }

    pub fn cancelled_count(&self) -> usize {
        lock(&self.state).cancelled
    }

    /// Periods of the active schedules.
    pub fn periods(&self) -> Vec<Duration> {
        lock(&self.state)
            .active
            .values()
            .map(|(period, _)| *period)
            .collect()
    }
}

impl TimerSource for ManualTimer {
    fn schedule_repeating(&mut self, period: Duration, events: EventSender) -> TimerHandle {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        state.active.insert(id, (period, events));
        TimerHandle(id)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        let mut state = lock(&self.state);
        if state.active.remove(&handle.0).is_some() {
            state.cancelled += 1;
        }
    }
}

#[derive(Debug, Default)]
struct ScriptedClassifierState {
    available: bool,
    subscriber: Option<EventSender>,
    intervals: Vec<Duration>,
    unsubscribes: usize,
}

/// A classifier whose readings are pushed by the test.
#[derive(Debug, Clone)]
pub struct ScriptedClassifier {
    state: Arc<Mutex<ScriptedClassifierState>>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptedClassifierState {
                available: true,
                ..ScriptedClassifierState::default()
            })),
        }
    }

    /// A classifier that reports no hardware.
    pub fn unavailable() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptedClassifierState::default())),
        }
    }

    /// Deliver a reading to the current subscriber. Returns `false` when
    /// there is none.
    pub fn emit(&self, reading: ActivityReading) -> bool {
        match lock(&self.state).subscriber.as_ref() {
            Some(events) => events.send(EngineEvent::Activity(reading)),
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.state).subscriber.is_some()
    }

    /// Every sampling interval the engine has requested, in order.
    pub fn intervals(&self) -> Vec<Duration> {
        lock(&self.state).intervals.clone()
    }

    pub fn last_interval(&self) -> Option<Duration> {
        lock(&self.state).intervals.last().copied()
    }

    pub fn unsubscribe_count(&self) -> usize {
        lock(&self.state).unsubscribes
    }
}

impl Default for ScriptedClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityClassifier for ScriptedClassifier {
    fn is_available(&self) -> bool {
        lock(&self.state).available
    }

    fn subscribe(&mut self, events: EventSender) -> Result<(), AdapterError> {
        let mut state = lock(&self.state);
        if state.subscriber.is_some() {
            return Err(AdapterError::AlreadySubscribed);
        }
        state.subscriber = Some(events);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        let mut state = lock(&self.state);
        state.subscriber = None;
        state.unsubscribes += 1;
    }

    fn set_sampling_interval(&mut self, interval: Duration) {
        lock(&self.state).intervals.push(interval);
    }
}

#[derive(Debug, Default)]
struct ScriptedStepState {
    available: bool,
    subscriber: Option<EventSender>,
    since: Option<DateTime<Utc>>,
}

/// A pedometer whose samples are pushed by the test.
#[derive(Debug, Clone)]
pub struct ScriptedStepCounter {
    state: Arc<Mutex<ScriptedStepState>>,
}

impl ScriptedStepCounter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptedStepState {
                available: true,
                ..ScriptedStepState::default()
            })),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptedStepState::default())),
        }
    }

    pub fn emit(&self, sample: StepSample) -> bool {
        match lock(&self.state).subscriber.as_ref() {
            Some(events) => events.send(EngineEvent::Steps(sample)),
            None => false,
        }
    }

    /// Shorthand for emitting a cumulative count.
    pub fn emit_count(&self, steps: i64) -> bool {
        self.emit(StepSample::Count(steps))
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.state).subscriber.is_some()
    }

    /// Start of the window requested by the last subscribe.
    pub fn since(&self) -> Option<DateTime<Utc>> {
        lock(&self.state).since
    }
}

impl Default for ScriptedStepCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl StepCounter for ScriptedStepCounter {
    fn is_available(&self) -> bool {
        lock(&self.state).available
    }

    fn subscribe(&mut self, since: DateTime<Utc>, events: EventSender) -> Result<(), AdapterError> {
        let mut state = lock(&self.state);
        if state.subscriber.is_some() {
            return Err(AdapterError::AlreadySubscribed);
        }
        state.subscriber = Some(events);
        state.since = Some(since);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        lock(&self.state).subscriber = None;
    }
}

/// Collects every notification request.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    new_days: Arc<Mutex<usize>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.sent).clone()
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.sent).iter().map(|n| n.key.clone()).collect()
    }

    /// How many times the engine announced a new day.
    pub fn new_day_count(&self) -> usize {
        *lock(&self.new_days)
    }
}

impl NotificationSink for RecordingNotifier {
    fn enqueue(&mut self, notification: Notification) {
        lock(&self.sent).push(notification);
    }

    fn start_new_day(&mut self) {
        *lock(&self.new_days) += 1;
    }
}

/// Collects every haptic pattern played.
#[derive(Debug, Clone, Default)]
pub struct RecordingHaptics {
    played: Arc<Mutex<Vec<HapticPattern>>>,
}

impl RecordingHaptics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patterns(&self) -> Vec<HapticPattern> {
        lock(&self.played).clone()
    }
}

impl HapticSink for RecordingHaptics {
    fn play(&mut self, pattern: HapticPattern) {
        lock(&self.played).push(pattern);
    }
}
