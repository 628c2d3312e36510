//! Sensor adapters for the coach.
//!
//! The engine owns its adapters as trait objects. Adapters never hold a
//! reference back to the engine; they push readings through an
//! [`EventSender`], which is just the engine's inbox plus the subscription
//! epoch the sender was created under.

pub mod simulated;
pub mod types;
pub mod unavailable;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Sender, TrySendError};
use std::time::Duration;

// Re-export commonly used types
pub use simulated::{ActivityPlan, PlanError, PlanLeg, SimulatedClassifier, SimulatedStepCounter};
pub use types::{ActivityReading, EngineEvent, Envelope, StepSample};
pub use unavailable::{UnavailableClassifier, UnavailableStepCounter};

/// Errors an adapter can report when asked to subscribe.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("adapter is already subscribed")]
    AlreadySubscribed,
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
}

/// Non-owning handle adapters use to deliver events to the engine.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: Sender<Envelope>,
    epoch: u64,
}

impl EventSender {
    pub(crate) fn new(sender: Sender<Envelope>, epoch: u64) -> Self {
        Self { sender, epoch }
    }

    /// Deliver an event without blocking.
    ///
    /// A full inbox drops the event. Returns `false` only once the engine is
    /// gone, which adapter threads treat as a signal to exit.
    pub fn send(&self, event: EngineEvent) -> bool {
        match self.sender.try_send(Envelope {
            epoch: self.epoch,
            event,
        }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(epoch = self.epoch, "engine inbox full, dropping event");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// The subscription epoch this sender tags its events with.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Motion classifier contract.
pub trait ActivityClassifier: Send {
    /// Whether the hardware exists at all. Unavailable classifiers are never
    /// subscribed.
    fn is_available(&self) -> bool;

    /// Begin delivering [`EngineEvent::Activity`] readings.
    fn subscribe(&mut self, events: EventSender) -> Result<(), AdapterError>;

    /// Stop delivering readings. Must be idempotent and must not return until
    /// no further reading can be sent.
    fn unsubscribe(&mut self);

    /// Change how often the classifier samples.
    fn set_sampling_interval(&mut self, interval: Duration);
}

/// Pedometer contract.
pub trait StepCounter: Send {
    /// Whether the hardware exists at all.
    fn is_available(&self) -> bool;

    /// Begin delivering cumulative counts measured from `since`.
    fn subscribe(&mut self, since: DateTime<Utc>, events: EventSender)
        -> Result<(), AdapterError>;

    /// Stop delivering counts. Same guarantees as
    /// [`ActivityClassifier::unsubscribe`].
    fn unsubscribe(&mut self);
}
