//! Simulated motion and pedometer sensors driven by an activity plan.
//!
//! A plan is a sequence of legs ("walk for 20 minutes, then sit for an
//! hour"). The simulated classifier samples the plan at whatever interval the
//! engine asks for, and the simulated pedometer integrates per-activity
//! cadences into a cumulative count. Both read time from the shared
//! [`Clock`], so a [`ScaledClock`](crate::clock::ScaledClock) can replay a
//! whole day in minutes.

use crate::clock::{clamp_speed, Clock};
use crate::collector::types::{ActivityReading, EngineEvent, StepSample};
use crate::collector::{ActivityClassifier, AdapterError, EventSender, StepCounter};
use crate::core::ActivityState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Simulated time between pedometer reports.
const STEP_REPORT_PERIOD: Duration = Duration::from_secs(10);

/// Longest a sensor thread sleeps before re-checking its stop flag.
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// One stretch of a single activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanLeg {
    pub activity: ActivityState,
    pub minutes: f64,
}

/// A scripted outing for the simulated sensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPlan {
    /// Steps already on the counter when the plan begins
    #[serde(default)]
    pub initial_steps: u64,
    pub legs: Vec<PlanLeg>,
}

/// Errors loading a plan.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("failed to read plan: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse plan: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("plan has no legs")]
    Empty,
    #[error("leg {index} must last a positive number of minutes")]
    BadLeg { index: usize },
}

impl ActivityPlan {
    /// Load and validate a plan from a JSON file.
    pub fn load(path: &Path) -> Result<Self, PlanError> {
        let content = std::fs::read_to_string(path)?;
        let plan: ActivityPlan = serde_json::from_str(&content)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if self.legs.is_empty() {
            return Err(PlanError::Empty);
        }
        if let Some(index) = self
            .legs
            .iter()
            .position(|leg| !(leg.minutes.is_finite() && leg.minutes > 0.0))
        {
            return Err(PlanError::BadLeg { index });
        }
        Ok(())
    }

    /// A morning that reaches a 10 000 step goal and includes a long sit.
    pub fn sample() -> Self {
        let leg = |activity, minutes| PlanLeg { activity, minutes };
        Self {
            initial_steps: 2_000,
            legs: vec![
                leg(ActivityState::Stationary, 5.0),
                leg(ActivityState::Walking, 20.0),
                leg(ActivityState::Running, 10.0),
                leg(ActivityState::Walking, 10.0),
                leg(ActivityState::Stationary, 65.0),
                leg(ActivityState::Walking, 30.0),
            ],
        }
    }

    /// Total simulated length.
    pub fn total_duration(&self) -> chrono::Duration {
        let minutes: f64 = self.legs.iter().map(|leg| leg.minutes).sum();
        chrono::Duration::milliseconds((minutes * 60_000.0) as i64)
    }

    /// Activity at `elapsed` into the plan, or `None` once it is over.
    pub fn activity_at(&self, elapsed: chrono::Duration) -> Option<ActivityState> {
        let mut remaining = to_minutes(elapsed);
        if remaining < 0.0 {
            return None;
        }
        for leg in &self.legs {
            if remaining < leg.minutes {
                return Some(leg.activity);
            }
            remaining -= leg.minutes;
        }
        None
    }

    /// Steps taken during the first `elapsed` of the plan, not counting
    /// `initial_steps`.
    pub fn steps_at(&self, elapsed: chrono::Duration) -> u64 {
        let mut remaining = to_minutes(elapsed).max(0.0);
        let mut steps = 0.0;
        for leg in &self.legs {
            let span = remaining.min(leg.minutes);
            steps += span * cadence_per_minute(leg.activity);
            remaining -= span;
            if remaining <= 0.0 {
                break;
            }
        }
        steps.floor() as u64
    }
}

fn to_minutes(elapsed: chrono::Duration) -> f64 {
    elapsed.num_milliseconds() as f64 / 60_000.0
}

fn cadence_per_minute(activity: ActivityState) -> f64 {
    match activity {
        ActivityState::Walking => 100.0,
        ActivityState::Running => 160.0,
        ActivityState::Stationary | ActivityState::Unknown => 0.0,
    }
}

/// The reading a real coprocessor would produce. Running also asserts the
/// walking flag.
fn reading_for(activity: ActivityState) -> ActivityReading {
    match activity {
        ActivityState::Stationary => ActivityReading::stationary(),
        ActivityState::Walking => ActivityReading::walking(),
        ActivityState::Running => ActivityReading {
            walking: true,
            running: true,
            ..ActivityReading::default()
        },
        ActivityState::Unknown => ActivityReading::unknown(),
    }
}

/// Sleep for `simulated` time at `speed`, waking early if `running` clears.
fn sleep_simulated(simulated: Duration, speed: f64, running: &AtomicBool) {
    let deadline = Instant::now() + simulated.div_f64(speed);
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

/// Shared state for one sensor thread.
struct SensorThread {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SensorThread {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    fn spawn<F>(&mut self, body: F)
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        self.handle = Some(thread::spawn(move || body(running)));
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("simulated sensor thread panicked");
            }
        }
    }
}

/// Motion classifier that samples an [`ActivityPlan`].
pub struct SimulatedClassifier {
    plan: Arc<ActivityPlan>,
    clock: Arc<dyn Clock>,
    started_at: DateTime<Utc>,
    speed: f64,
    interval_ms: Arc<AtomicU64>,
    thread: SensorThread,
}

impl SimulatedClassifier {
    pub fn new(
        plan: Arc<ActivityPlan>,
        clock: Arc<dyn Clock>,
        started_at: DateTime<Utc>,
        speed: f64,
    ) -> Self {
        Self {
            plan,
            clock,
            started_at,
            speed: clamp_speed(speed),
            interval_ms: Arc::new(AtomicU64::new(
                ActivityState::Unknown.poll_interval().as_millis() as u64,
            )),
            thread: SensorThread::new(),
        }
    }

    /// Sampling interval currently in effect.
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::SeqCst))
    }
}

impl ActivityClassifier for SimulatedClassifier {
    fn is_available(&self) -> bool {
        true
    }

    fn subscribe(&mut self, events: EventSender) -> Result<(), AdapterError> {
        if self.thread.is_running() {
            return Err(AdapterError::AlreadySubscribed);
        }

        let plan = Arc::clone(&self.plan);
        let clock = Arc::clone(&self.clock);
        let interval_ms = Arc::clone(&self.interval_ms);
        let started_at = self.started_at;
        let speed = self.speed;

        self.thread.spawn(move |running| {
            while running.load(Ordering::SeqCst) {
                let interval = Duration::from_millis(interval_ms.load(Ordering::SeqCst));
                sleep_simulated(interval, speed, &running);
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let Some(activity) = plan.activity_at(clock.now() - started_at) else {
                    continue;
                };
                if !events.send(EngineEvent::Activity(reading_for(activity))) {
                    break;
                }
            }
        });
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.thread.stop();
    }

    fn set_sampling_interval(&mut self, interval: Duration) {
        let previous = self.interval_ms.swap(interval.as_millis() as u64, Ordering::SeqCst);
        if previous != interval.as_millis() as u64 {
            tracing::debug!(?interval, "classifier sampling interval changed");
        }
    }
}

impl Drop for SimulatedClassifier {
    fn drop(&mut self) {
        self.thread.stop();
    }
}

/// Pedometer that integrates the cadence of an [`ActivityPlan`].
pub struct SimulatedStepCounter {
    plan: Arc<ActivityPlan>,
    clock: Arc<dyn Clock>,
    started_at: DateTime<Utc>,
    speed: f64,
    thread: SensorThread,
}

impl SimulatedStepCounter {
    pub fn new(
        plan: Arc<ActivityPlan>,
        clock: Arc<dyn Clock>,
        started_at: DateTime<Utc>,
        speed: f64,
    ) -> Self {
        Self {
            plan,
            clock,
            started_at,
            speed: clamp_speed(speed),
            thread: SensorThread::new(),
        }
    }
}

impl StepCounter for SimulatedStepCounter {
    fn is_available(&self) -> bool {
        true
    }

    fn subscribe(&mut self, since: DateTime<Utc>, events: EventSender) -> Result<(), AdapterError> {
        if self.thread.is_running() {
            return Err(AdapterError::AlreadySubscribed);
        }
        tracing::debug!(%since, "pedometer counting from start of day");

        let plan = Arc::clone(&self.plan);
        let clock = Arc::clone(&self.clock);
        let started_at = self.started_at;
        let speed = self.speed;

        self.thread.spawn(move |running| {
            while running.load(Ordering::SeqCst) {
                let elapsed = clock.now() - started_at;
                let steps = plan.initial_steps + plan.steps_at(elapsed);
                let count = i64::try_from(steps).unwrap_or(i64::MAX);
                if !events.send(EngineEvent::Steps(StepSample::Count(count))) {
                    break;
                }
                sleep_simulated(STEP_REPORT_PERIOD, speed, &running);
            }
        });
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.thread.stop();
    }
}

impl Drop for SimulatedStepCounter {
    fn drop(&mut self) {
        self.thread.stop();
    }
}
