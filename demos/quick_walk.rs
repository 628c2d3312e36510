//! A deterministic walk through one coaching session.
//!
//! Drives the engine with the testing doubles so the whole day plays out
//! instantly:
//! 1. Start monitoring with notifications allowed
//! 2. Sit still long enough for two inactivity reminders
//! 3. Walk, then run, collecting every milestone
//! 4. Stop and print what was delivered
//!
//! Run with: cargo run --example quick_walk

use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::{Duration, Utc};
use stride_coach::{
    collector::ActivityReading,
    core::{Collaborators, EngagementEngine, EngineSettings},
    testing::{
        ManualClock, ManualTimer, RecordingHaptics, RecordingNotifier, ScriptedClassifier,
        ScriptedStepCounter,
    },
};

fn main() {
    println!("Stride Coach - Quick Walk Demo");
    println!("==============================");
    println!();

    let clock = ManualClock::starting_at(Utc::now());
    let timer = ManualTimer::new();
    let classifier = ScriptedClassifier::new();
    let steps = ScriptedStepCounter::new();
    let notifier = RecordingNotifier::new();
    let haptics = RecordingHaptics::new();

    let settings = EngineSettings {
        step_goal: NonZeroU32::new(4_000).unwrap_or(NonZeroU32::MIN),
        inactivity_alert_threshold: NonZeroU32::new(20).unwrap_or(NonZeroU32::MIN),
        ..EngineSettings::default()
    };
    let mut engine = EngagementEngine::new(
        settings,
        Collaborators {
            classifier: Box::new(classifier.clone()),
            step_counter: Box::new(steps.clone()),
            timer: Box::new(timer.clone()),
            clock: Arc::new(clock.clone()),
            notifications: Box::new(notifier.clone()),
            haptics: Box::new(haptics.clone()),
        },
    );
    engine.set_notifications_authorized(true);
    engine.start();

    // Morning at the desk
    classifier.emit(ActivityReading::stationary());
    for _ in 0..45 {
        clock.advance(Duration::minutes(1));
        timer.fire();
        engine.process_pending();
    }
    println!("After sitting:  {}", engine.snapshot().status_line());

    // Lunch walk, 100 steps a minute, then a short run
    classifier.emit(ActivityReading::walking());
    let mut total = 0;
    for minute in 0..40 {
        total += if minute < 30 { 100 } else { 160 };
        if minute == 30 {
            classifier.emit(ActivityReading::running());
        }
        clock.advance(Duration::minutes(1));
        steps.emit_count(total);
        timer.fire();
        engine.process_pending();
    }
    println!("After walking:  {}", engine.snapshot().status_line());

    engine.stop();
    println!();

    println!("Notifications:");
    for notification in notifier.notifications() {
        println!("  [{}] {}: {}", notification.key, notification.title, notification.body);
    }
    println!();
    println!("Haptics: {:?}", haptics.patterns());
    println!("Sampling intervals: {:?}", classifier.intervals());
    println!();
    println!("{}", engine.stats().summary());
}
