//! Stride Coach - a reactive engine that coaches a user toward a daily step goal.
//!
//! The engine listens to a motion classifier and a pedometer, adapts how often
//! the classifier samples to how much the user is moving, notices long spells
//! of stillness, and celebrates progress milestones. Every alert fires at most
//! once per qualifying event.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  Activity   ┌──────────────────────┐  enqueue  ┌──────────────┐
//! │  Classifier  │────────────▶│                      │──────────▶│ Notification │
//! └──────────────┘             │                      │           └──────────────┘
//!        ▲ sampling interval   │   EngagementEngine   │   play    ┌──────────────┐
//!        └─────────────────────│   (single owner,     │──────────▶│    Haptic    │
//! ┌──────────────┐  Steps      │    one inbox)        │           └──────────────┘
//! │  Pedometer   │────────────▶│                      │  snapshot ┌──────────────┐
//! └──────────────┘             │                      │──────────▶│  Observers   │
//! ┌──────────────┐  Tick       │                      │           └──────────────┘
//! │    Timer     │────────────▶│                      │
//! └──────────────┘             └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use stride_coach::{
//!     alerts::{ConsoleHaptics, ConsoleNotifier, FixedAuthorizer},
//!     clock::{SystemClock, ThreadTimer},
//!     collector::{ActivityPlan, SimulatedClassifier, SimulatedStepCounter},
//!     core::{Collaborators, EngagementEngine, EngineSettings},
//! };
//!
//! let clock = Arc::new(SystemClock);
//! let plan = Arc::new(ActivityPlan::sample());
//! let now = chrono::Utc::now();
//! let collab = Collaborators {
//!     classifier: Box::new(SimulatedClassifier::new(plan.clone(), clock.clone(), now, 1.0)),
//!     step_counter: Box::new(SimulatedStepCounter::new(plan, clock.clone(), now, 1.0)),
//!     timer: Box::new(ThreadTimer::new()),
//!     clock,
//!     notifications: Box::new(ConsoleNotifier::new()),
//!     haptics: Box::new(ConsoleHaptics::new()),
//! };
//!
//! let mut engine = EngagementEngine::new(EngineSettings::default(), collab);
//! engine.request_notification_authorization(FixedAuthorizer::new(true));
//! engine.start();
//! loop {
//!     engine.pump(Duration::from_millis(100));
//! }
//! ```

pub mod alerts;
pub mod clock;
pub mod collector;
pub mod config;
pub mod core;
pub mod stats;
pub mod testing;

// Re-export key types at crate root for convenience
pub use alerts::{HapticPattern, HapticSink, Notification, NotificationAuthorizer, NotificationSink};
pub use clock::{Clock, TimerSource};
pub use collector::{ActivityClassifier, ActivityReading, EngineEvent, StepCounter, StepSample};
pub use config::{Config, ConfigError, SourceConfig};
pub use self::core::{ActivityState, Collaborators, EngagementEngine, EngagementSnapshot, EngineSettings};
pub use stats::{SessionStats, SharedStats, StatsSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
