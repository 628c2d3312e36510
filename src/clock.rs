//! Time sources for the engine.
//!
//! The engine asks a [`Clock`] for "now" and a [`TimerSource`] for its
//! periodic inactivity tick. Ticks are delivered through the same inbox as
//! sensor events so they are processed in order with everything else.

use crate::collector::{EngineEvent, EventSender};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use crossbeam_channel::{bounded, select, tick, Sender};
use std::collections::HashMap;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Slowest supported simulation speed.
pub const MIN_SPEED: f64 = 0.1;

/// Fastest supported simulation speed.
pub const MAX_SPEED: f64 = 10_000.0;

/// Wall-clock time query.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that runs `speed` times faster than real time, starting at
/// `origin`. Used to replay a long outing in a few seconds.
#[derive(Debug, Clone)]
pub struct ScaledClock {
    origin: DateTime<Utc>,
    started: Instant,
    speed: f64,
}

impl ScaledClock {
    pub fn new(origin: DateTime<Utc>, speed: f64) -> Self {
        Self {
            origin,
            started: Instant::now(),
            speed: clamp_speed(speed),
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }
}

impl Clock for ScaledClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.started.elapsed().mul_f64(self.speed);
        self.origin
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

/// Handle for a scheduled repeating timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub(crate) u64);

/// Source of the periodic inactivity tick.
pub trait TimerSource: Send {
    /// Deliver [`EngineEvent::Tick`] through `events` every `period`.
    fn schedule_repeating(&mut self, period: Duration, events: EventSender) -> TimerHandle;

    /// Stop a timer. After this returns no further tick is sent for `handle`.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Timer backed by one thread per schedule.
///
/// Each schedule selects over a crossbeam `tick` channel and a cancel channel;
/// cancelling drops the cancel sender and joins the thread.
pub struct ThreadTimer {
    speed: f64,
    next_id: u64,
    timers: HashMap<u64, (Sender<()>, JoinHandle<()>)>,
}

impl ThreadTimer {
    pub fn new() -> Self {
        Self::with_speed(1.0)
    }

    /// A timer whose periods shrink by `speed`, to pair with a [`ScaledClock`].
    pub fn with_speed(speed: f64) -> Self {
        Self {
            speed: clamp_speed(speed),
            next_id: 1,
            timers: HashMap::new(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Default for ThreadTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerSource for ThreadTimer {
    fn schedule_repeating(&mut self, period: Duration, events: EventSender) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;

        let wall_period = period.div_f64(self.speed).max(Duration::from_millis(1));
        let ticker = tick(wall_period);
        let (cancel_tx, cancel_rx) = bounded::<()>(0);

        let handle = thread::spawn(move || loop {
            select! {
                recv(ticker) -> _ => {
                    if !events.send(EngineEvent::Tick) {
                        break;
                    }
                }
                recv(cancel_rx) -> _ => break,
            }
        });

        tracing::debug!(timer = id, ?period, ?wall_period, "scheduled repeating timer");
        self.timers.insert(id, (cancel_tx, handle));
        TimerHandle(id)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some((cancel_tx, thread)) = self.timers.remove(&handle.0) {
            drop(cancel_tx);
            if thread.join().is_err() {
                tracing::warn!(timer = handle.0, "timer thread panicked");
            }
        }
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        let ids: Vec<u64> = self.timers.keys().copied().collect();
        for id in ids {
            self.cancel(TimerHandle(id));
        }
    }
}

/// Midnight of the local day containing `now`, in `tz`, as UTC.
///
/// Falls back to `now` if local midnight does not exist (a DST gap at 00:00).
pub fn start_of_day(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local = now.with_timezone(&tz);
    let Some(midnight) = local.date_naive().and_hms_opt(0, 0, 0) else {
        return now;
    };
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Bring a simulation speed into `MIN_SPEED..=MAX_SPEED`. Non-finite or
/// non-positive values mean real time.
pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_finite() && speed > 0.0 {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    } else {
        1.0
    }
}
