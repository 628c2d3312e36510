//! End-to-end tests for the engagement engine, driven through its inbox with
//! deterministic collaborators.

use chrono::{DateTime, TimeZone, Utc};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use stride_coach::alerts::{FixedAuthorizer, HapticPattern};
use stride_coach::clock::Clock;
use stride_coach::collector::{ActivityReading, EngineEvent, StepSample};
use stride_coach::core::{
    ActivityState, Collaborators, EngagementEngine, EngineSettings, DEFAULT_TICK_PERIOD,
    OBSERVER_CAPACITY,
};
use stride_coach::testing::{
    ManualClock, ManualTimer, RecordingHaptics, RecordingNotifier, ScriptedClassifier,
    ScriptedStepCounter,
};

fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 15, 30, 0).unwrap()
}

struct Harness {
    engine: EngagementEngine,
    clock: ManualClock,
    timer: ManualTimer,
    classifier: ScriptedClassifier,
    steps: ScriptedStepCounter,
    notifier: RecordingNotifier,
    haptics: RecordingHaptics,
}

impl Harness {
    fn new(goal: u32, threshold: u32) -> Self {
        Self::with_adapters(
            goal,
            threshold,
            ScriptedClassifier::new(),
            ScriptedStepCounter::new(),
        )
    }

    fn with_adapters(
        goal: u32,
        threshold: u32,
        classifier: ScriptedClassifier,
        steps: ScriptedStepCounter,
    ) -> Self {
        let clock = ManualClock::starting_at(origin());
        let timer = ManualTimer::new();
        let notifier = RecordingNotifier::new();
        let haptics = RecordingHaptics::new();

        let settings = EngineSettings {
            step_goal: NonZeroU32::new(goal).unwrap(),
            inactivity_alert_threshold: NonZeroU32::new(threshold).unwrap(),
            ..EngineSettings::default()
        };
        let collab = Collaborators {
            classifier: Box::new(classifier.clone()),
            step_counter: Box::new(steps.clone()),
            timer: Box::new(timer.clone()),
            clock: Arc::new(clock.clone()),
            notifications: Box::new(notifier.clone()),
            haptics: Box::new(haptics.clone()),
        };

        Self {
            engine: EngagementEngine::new(settings, collab),
            clock,
            timer,
            classifier,
            steps,
            notifier,
            haptics,
        }
    }

    /// A monitoring engine with notifications allowed.
    fn monitoring(goal: u32, threshold: u32) -> Self {
        let mut harness = Self::new(goal, threshold);
        harness.engine.set_notifications_authorized(true);
        harness.engine.start();
        harness
    }

    fn activity(&mut self, reading: ActivityReading) {
        assert!(self.classifier.emit(reading));
        self.engine.process_pending();
    }

    fn step_count(&mut self, steps: i64) {
        assert!(self.steps.emit_count(steps));
        self.engine.process_pending();
    }

    fn minute_tick(&mut self) {
        self.clock.advance(chrono::Duration::minutes(1));
        assert_eq!(self.timer.fire(), 1);
        self.engine.process_pending();
    }

    fn milestone_keys(&self) -> Vec<String> {
        self.notifier
            .keys()
            .into_iter()
            .filter(|k| k.starts_with("milestone-"))
            .collect()
    }

    fn reminder_count(&self) -> usize {
        self.notifier
            .keys()
            .iter()
            .filter(|k| k.starts_with("inactivity-"))
            .count()
    }

    fn celebration_haptics(&self) -> Vec<HapticPattern> {
        self.haptics
            .patterns()
            .into_iter()
            .filter(|p| matches!(p, HapticPattern::Success | HapticPattern::Notification))
            .collect()
    }
}

#[test]
fn test_start_subscribes_everything() {
    let mut h = Harness::new(10_000, 60);
    h.engine.start();

    let snapshot = h.engine.snapshot();
    assert!(snapshot.is_monitoring);
    assert!(h.classifier.is_subscribed());
    assert!(h.steps.is_subscribed());
    assert_eq!(h.timer.periods(), vec![DEFAULT_TICK_PERIOD]);
    assert_eq!(h.haptics.patterns(), vec![HapticPattern::Start]);
    // Initial activity is Unknown, sampled every 10s.
    assert_eq!(h.classifier.last_interval(), Some(Duration::from_secs(10)));
    // Step feed counts from local midnight.
    assert_eq!(
        h.steps.since(),
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
    );
}

#[test]
fn test_start_and_stop_are_idempotent() {
    let mut h = Harness::new(10_000, 60);
    h.engine.stop();
    assert!(h.haptics.patterns().is_empty());

    h.engine.start();
    h.engine.start();
    assert_eq!(h.timer.active_count(), 1);

    h.engine.stop();
    h.engine.stop();
    assert!(!h.engine.is_monitoring());
    assert!(!h.classifier.is_subscribed());
    assert!(!h.steps.is_subscribed());
    assert_eq!(h.classifier.unsubscribe_count(), 1);
    assert_eq!(h.timer.active_count(), 0);
    assert_eq!(h.timer.cancelled_count(), 1);
    assert_eq!(
        h.haptics.patterns(),
        vec![HapticPattern::Start, HapticPattern::Stop]
    );
}

#[test]
fn test_restart_after_stop() {
    let mut h = Harness::monitoring(100, 60);
    h.engine.stop();
    h.engine.start();

    h.step_count(30);
    assert_eq!(h.engine.snapshot().steps, 30);
    assert_eq!(h.engine.snapshot().last_milestone_reached, 25);
}

#[test]
fn test_one_celebration_per_qualifying_update() {
    let mut h = Harness::monitoring(100, 60);

    h.step_count(30);
    assert_eq!(h.engine.snapshot().last_milestone_reached, 25);
    h.step_count(60);
    assert_eq!(h.engine.snapshot().last_milestone_reached, 50);
    // 60 -> 100 skips past 75 and 100 but only the first is celebrated.
    h.step_count(100);
    assert_eq!(h.engine.snapshot().last_milestone_reached, 75);

    assert_eq!(
        h.milestone_keys(),
        vec!["milestone-25", "milestone-50", "milestone-75"]
    );
    assert_eq!(
        h.celebration_haptics(),
        vec![HapticPattern::Notification; 3]
    );
}

#[test]
fn test_goal_uses_success_pattern() {
    let mut h = Harness::monitoring(100, 60);
    for steps in [30, 60, 80, 100] {
        h.step_count(steps);
    }

    assert_eq!(h.engine.snapshot().last_milestone_reached, 100);
    assert_eq!(
        h.milestone_keys(),
        vec!["milestone-25", "milestone-50", "milestone-75", "milestone-100"]
    );
    assert_eq!(
        h.celebration_haptics().last(),
        Some(&HapticPattern::Success)
    );
    let last = h.notifier.notifications().pop().unwrap();
    assert_eq!(last.title, "Goal reached!");
}

#[test]
fn test_large_jump_fires_only_first_milestone() {
    let mut h = Harness::monitoring(1_000, 60);
    h.step_count(5_000);

    assert_eq!(h.engine.snapshot().last_milestone_reached, 25);
    assert_eq!(h.milestone_keys(), vec!["milestone-25"]);

    // Already past everything, so further updates cannot fire.
    h.step_count(6_000);
    assert_eq!(h.milestone_keys().len(), 1);
}

#[test]
fn test_milestones_never_repeat_or_decrease() {
    let mut h = Harness::monitoring(100, 60);
    let mut last = 0;
    for steps in [10, 30, 10, 30, 55, 20, 76, 76, 99, 40, 100, 100] {
        h.step_count(steps);
        let reached = h.engine.snapshot().last_milestone_reached;
        assert!(reached >= last, "milestone went backwards at {steps}");
        last = reached;
    }

    let keys = h.milestone_keys();
    let mut unique = keys.clone();
    unique.dedup();
    assert_eq!(keys, unique);
    assert_eq!(
        keys,
        vec!["milestone-25", "milestone-50", "milestone-75", "milestone-100"]
    );
    assert!(h.engine.stats().stats().step_regressions >= 3);
}

#[test]
fn test_step_regression_taken_as_baseline() {
    let mut h = Harness::monitoring(100, 60);
    h.step_count(80);
    h.step_count(10);

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.steps, 10);
    assert_eq!(snapshot.last_milestone_reached, 25);
    assert_eq!(h.engine.stats().stats().step_regressions, 1);
}

#[test]
fn test_unauthorized_celebration_skips_notification_only() {
    let mut h = Harness::new(100, 60);
    h.engine.start();
    h.step_count(25);

    assert!(h.notifier.notifications().is_empty());
    assert_eq!(h.celebration_haptics(), vec![HapticPattern::Notification]);
    assert!(h.engine.snapshot().celebrating);
    assert_eq!(h.engine.snapshot().last_milestone_reached, 25);
}

#[test]
fn test_celebration_flag_clears_after_window() {
    let mut h = Harness::monitoring(100, 60);
    h.step_count(50);
    assert!(h.engine.snapshot().celebrating);

    h.clock.advance(chrono::Duration::milliseconds(1_500));
    h.engine.pump(Duration::ZERO);
    assert!(h.engine.snapshot().celebrating);

    h.clock.advance(chrono::Duration::milliseconds(600));
    h.engine.pump(Duration::ZERO);
    assert!(!h.engine.snapshot().celebrating);
}

#[test]
fn test_stationary_transition_tracking() {
    let mut h = Harness::monitoring(10_000, 60);

    h.activity(ActivityReading::stationary());
    let since = h.engine.snapshot().stationary_since;
    assert_eq!(since, Some(origin()));

    // Staying still keeps the original start.
    h.clock.advance(chrono::Duration::minutes(3));
    h.activity(ActivityReading::stationary());
    assert_eq!(h.engine.snapshot().stationary_since, since);

    for _ in 0..10 {
        h.minute_tick();
    }
    assert_eq!(h.engine.snapshot().inactivity_minutes, 13);

    h.activity(ActivityReading::walking());
    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.current_activity, ActivityState::Walking);
    assert!(snapshot.stationary_since.is_none());
    assert_eq!(snapshot.inactivity_minutes, 0);
}

#[test]
fn test_unknown_also_clears_stillness() {
    let mut h = Harness::monitoring(10_000, 60);
    h.activity(ActivityReading::stationary());
    h.minute_tick();
    h.activity(ActivityReading::unknown());

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.current_activity, ActivityState::Unknown);
    assert!(snapshot.stationary_since.is_none());
    assert_eq!(snapshot.inactivity_minutes, 0);
}

#[test]
fn test_reminders_at_threshold_multiples() {
    let mut h = Harness::monitoring(10_000, 30);
    h.activity(ActivityReading::stationary());

    let mut fired_at = Vec::new();
    for minute in 1..=100u32 {
        let before = h.reminder_count();
        h.minute_tick();
        assert_eq!(h.engine.snapshot().inactivity_minutes, minute);
        if h.reminder_count() > before {
            fired_at.push(minute);
        }
    }

    assert_eq!(fired_at, vec![30, 60, 90]);
    let keys: Vec<String> = h
        .notifier
        .keys()
        .into_iter()
        .filter(|k| k.starts_with("inactivity-"))
        .collect();
    let expected = (origin() + chrono::Duration::minutes(30)).timestamp();
    assert_eq!(keys[0], format!("inactivity-{expected}"));
    assert_eq!(h.engine.stats().stats().reminders, 3);
}

#[test]
fn test_repeated_tick_in_same_minute_fires_once() {
    let mut h = Harness::monitoring(10_000, 5);
    h.activity(ActivityReading::stationary());
    for _ in 0..5 {
        h.minute_tick();
    }
    assert_eq!(h.reminder_count(), 1);

    // Jittered timer delivers a second tick before the minute rolls over.
    h.clock.advance(chrono::Duration::seconds(20));
    h.timer.fire();
    h.engine.process_pending();
    assert_eq!(h.reminder_count(), 1);
}

#[test]
fn test_reminder_needs_authorization() {
    let mut h = Harness::new(10_000, 2);
    h.engine.start();
    h.activity(ActivityReading::stationary());
    h.minute_tick();
    h.minute_tick();

    assert_eq!(h.reminder_count(), 0);
    assert_eq!(h.haptics.patterns(), vec![HapticPattern::Start]);
}

#[test]
fn test_moving_resets_reminder_cycle() {
    let mut h = Harness::monitoring(10_000, 2);
    h.activity(ActivityReading::stationary());
    h.minute_tick();
    h.minute_tick();
    assert_eq!(h.reminder_count(), 1);

    h.activity(ActivityReading::walking());
    h.activity(ActivityReading::stationary());
    h.minute_tick();
    assert_eq!(h.reminder_count(), 1);
    h.minute_tick();
    assert_eq!(h.reminder_count(), 2);
}

#[test]
fn test_tick_without_stillness_is_noop() {
    let mut h = Harness::monitoring(10_000, 1);
    h.activity(ActivityReading::walking());
    h.minute_tick();
    h.minute_tick();

    assert_eq!(h.engine.snapshot().inactivity_minutes, 0);
    assert_eq!(h.reminder_count(), 0);
    assert_eq!(h.engine.stats().stats().ticks, 2);
}

#[test]
fn test_reset_daily_keeps_monitoring() {
    let mut h = Harness::monitoring(100, 60);
    h.step_count(60);
    h.activity(ActivityReading::stationary());
    h.minute_tick();
    h.minute_tick();

    h.engine.reset_daily();
    let snapshot = h.engine.snapshot();
    assert!(snapshot.is_monitoring);
    assert_eq!(snapshot.steps, 0);
    assert_eq!(snapshot.last_milestone_reached, 0);
    assert_eq!(snapshot.inactivity_minutes, 0);
    assert!(snapshot.stationary_since.is_none());
    assert_eq!(snapshot.step_goal.get(), 100);

    // Milestones can be earned again after a reset.
    h.step_count(30);
    assert_eq!(h.engine.snapshot().last_milestone_reached, 25);
}

#[test]
fn test_restart_next_day_counts_from_new_midnight() {
    let mut h = Harness::monitoring(100, 60);
    h.engine.stop();
    h.engine.reset_daily();

    h.clock
        .set(Utc.with_ymd_and_hms(2024, 5, 2, 7, 15, 0).unwrap());
    h.engine.start();
    assert_eq!(
        h.steps.since(),
        Some(Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap())
    );
}

#[test]
fn test_still_spell_restarts_after_reset() {
    let mut h = Harness::monitoring(10_000, 5);
    h.activity(ActivityReading::stationary());
    for _ in 0..3 {
        h.minute_tick();
    }

    h.engine.reset_daily();
    assert!(h.engine.snapshot().stationary_since.is_none());
    assert_eq!(h.notifier.new_day_count(), 1);

    // Already stationary, so this reading is not a transition.
    assert_eq!(h.engine.snapshot().current_activity, ActivityState::Stationary);
    h.activity(ActivityReading::stationary());
    assert_eq!(h.engine.snapshot().stationary_since, Some(h.clock.now()));

    for _ in 0..4 {
        h.minute_tick();
    }
    assert_eq!(h.reminder_count(), 0);
    h.minute_tick();
    assert_eq!(h.engine.snapshot().inactivity_minutes, 5);
    assert_eq!(h.reminder_count(), 1);
}

#[test]
fn test_stop_ends_still_spell() {
    let mut h = Harness::monitoring(10_000, 60);
    h.activity(ActivityReading::stationary());
    for _ in 0..10 {
        h.minute_tick();
    }

    h.engine.stop();
    let snapshot = h.engine.snapshot();
    assert!(snapshot.stationary_since.is_none());
    assert_eq!(snapshot.inactivity_minutes, 0);

    // Unwatched gap long enough to cross the threshold if it were counted.
    h.clock.advance(chrono::Duration::minutes(50));
    h.engine.start();
    h.minute_tick();
    assert_eq!(h.engine.snapshot().inactivity_minutes, 0);
    assert_eq!(h.reminder_count(), 0);

    // The spell restarts at the first watched still reading.
    h.activity(ActivityReading::stationary());
    for _ in 0..59 {
        h.minute_tick();
    }
    assert_eq!(h.reminder_count(), 0);
    h.minute_tick();
    assert_eq!(h.reminder_count(), 1);
}

#[test]
fn test_reset_daily_while_idle() {
    let mut h = Harness::monitoring(100, 60);
    h.step_count(30);
    h.engine.stop();
    h.engine.reset_daily();

    assert!(!h.engine.is_monitoring());
    assert_eq!(h.engine.snapshot().steps, 0);
}

#[test]
fn test_events_queued_before_stop_are_dropped() {
    let mut h = Harness::monitoring(100, 60);
    let late = h.engine.event_sender();

    // Delivered by the adapters but not yet processed when stop runs.
    assert!(h.steps.emit_count(90));
    assert!(h.classifier.emit(ActivityReading::running()));
    h.timer.fire();
    h.engine.stop();
    h.engine.process_pending();

    // In flight on another thread, arriving after stop.
    assert!(late.send(EngineEvent::Steps(StepSample::Count(95))));
    h.engine.process_pending();

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.steps, 0);
    assert_eq!(snapshot.current_activity, ActivityState::Unknown);
    assert_eq!(snapshot.last_milestone_reached, 0);
    assert!(h.notifier.notifications().is_empty());
    assert_eq!(h.engine.stats().stats().stale_events, 4);

    // A stale sender stays stale after a restart.
    h.engine.start();
    assert!(late.send(EngineEvent::Steps(StepSample::Count(95))));
    h.engine.process_pending();
    assert_eq!(h.engine.snapshot().steps, 0);
}

#[test]
fn test_handlers_ignored_while_idle() {
    let mut h = Harness::new(100, 60);
    h.engine.handle_steps(StepSample::Count(80));
    h.engine.handle_activity(ActivityReading::stationary());
    h.engine.handle_tick();

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.steps, 0);
    assert_eq!(snapshot.current_activity, ActivityState::Unknown);
    assert!(snapshot.stationary_since.is_none());
}

#[test]
fn test_malformed_payloads_are_ignored() {
    let mut h = Harness::monitoring(100, 60);
    h.step_count(40);
    h.activity(ActivityReading::walking());
    let before = h.engine.snapshot().clone();

    h.activity(ActivityReading::default());
    h.step_count(-5);
    assert!(h
        .steps
        .emit(StepSample::Failed("sensor busy".to_string())));
    h.engine.process_pending();

    assert_eq!(h.engine.snapshot(), &before);
    assert_eq!(h.engine.stats().stats().ignored_events, 3);
}

#[test]
fn test_poll_interval_follows_activity() {
    let mut h = Harness::monitoring(10_000, 60);
    let cases = [
        (ActivityReading::stationary(), 30),
        (ActivityReading::walking(), 5),
        (ActivityReading::running(), 1),
        (ActivityReading::unknown(), 10),
    ];
    for (reading, secs) in cases {
        h.activity(reading);
        assert_eq!(h.engine.snapshot().poll_interval, Duration::from_secs(secs));
        assert_eq!(h.classifier.last_interval(), Some(Duration::from_secs(secs)));
    }

    // A multi-flag reading resolves by priority before picking an interval.
    h.activity(ActivityReading {
        stationary: true,
        walking: true,
        ..ActivityReading::default()
    });
    assert_eq!(h.engine.snapshot().current_activity, ActivityState::Walking);
    assert_eq!(h.classifier.last_interval(), Some(Duration::from_secs(5)));
}

#[test]
fn test_unavailable_adapters_degrade_gracefully() {
    let mut h = Harness::with_adapters(
        100,
        60,
        ScriptedClassifier::unavailable(),
        ScriptedStepCounter::unavailable(),
    );
    h.engine.start();

    assert!(h.engine.is_monitoring());
    assert!(!h.classifier.is_subscribed());
    assert!(!h.steps.is_subscribed());
    assert!(h.classifier.intervals().is_empty());
    assert_eq!(h.timer.active_count(), 1);

    assert_eq!(h.timer.fire(), 1);
    h.engine.process_pending();
    assert_eq!(h.engine.stats().stats().ticks, 1);
}

#[test]
fn test_authorization_arrives_through_inbox() {
    let mut h = Harness::new(100, 60);
    assert!(!h.engine.snapshot().notifications_authorized);

    h.engine
        .request_notification_authorization(FixedAuthorizer::new(true));
    for _ in 0..100 {
        h.engine.pump(Duration::from_millis(20));
        if h.engine.snapshot().notifications_authorized {
            break;
        }
    }
    assert!(h.engine.snapshot().notifications_authorized);
}

#[test]
fn test_observers_see_each_change() {
    let mut h = Harness::new(100, 60);
    let changes = h.engine.subscribe();

    h.engine.start();
    h.step_count(30);
    h.activity(ActivityReading::running());

    let seen: Vec<_> = changes.try_iter().collect();
    assert_eq!(seen.len(), 3);
    assert!(seen[0].is_monitoring);
    assert_eq!(seen[1].steps, 30);
    assert!(seen[1].celebrating);
    assert_eq!(seen[2].current_activity, ActivityState::Running);

    drop(changes);
    h.step_count(40);
    assert_eq!(h.engine.snapshot().steps, 40);
}

#[test]
fn test_slow_observer_buffer_is_bounded() {
    let mut h = Harness::new(1_000_000, 60);
    let changes = h.engine.subscribe();
    h.engine.start();

    let updates = OBSERVER_CAPACITY as i64 + 50;
    for steps in 1..=updates {
        h.step_count(steps);
    }
    assert_eq!(changes.len(), OBSERVER_CAPACITY);
    assert_eq!(h.engine.snapshot().steps, updates as u64);

    // Once drained the observer receives new changes again.
    while changes.try_recv().is_ok() {}
    h.step_count(updates + 1);
    let latest = changes.try_recv().unwrap();
    assert_eq!(latest.steps, updates as u64 + 1);
}

#[test]
fn test_settings_changes() {
    let mut h = Harness::monitoring(100, 60);
    h.step_count(40);

    h.engine.set_step_goal(NonZeroU32::new(200).unwrap());
    assert_eq!(h.engine.snapshot().percent(), 20);
    // Changing the goal alone never celebrates.
    assert_eq!(h.milestone_keys(), vec!["milestone-25"]);

    h.engine
        .set_inactivity_threshold(NonZeroU32::new(1).unwrap());
    h.activity(ActivityReading::stationary());
    h.minute_tick();
    assert_eq!(h.reminder_count(), 1);
}
