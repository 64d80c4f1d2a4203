//! Scripted in-memory collaborators for tests and simulations.

mod adapter;
mod directory;
mod source;
mod store;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

pub use adapter::ScriptedAdapter;
pub use directory::MemoryDirectory;
pub use source::MemoryDataSource;
pub use store::MemoryStore;

/// Hand-driven clock. Every reading advances it by `step`, so consecutive
/// transitions get distinct, ordered timestamps.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
    step: TimeDelta,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self { Self { now: Arc::new(Mutex::new(start)), step: TimeDelta::zero() } }

    /// Clock starting at 2024-01-01T00:00:00Z, one second per reading.
    pub fn ticking() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()).with_step(TimeDelta::seconds(1))
    }

    pub fn with_step(mut self, step: TimeDelta) -> Self {
        self.step = step;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        let mut now = self.now.lock().unwrap();
        let current = *now;
        *now = current + self.step;
        current
    }

    /// Current reading without advancing.
    pub fn peek(&self) -> DateTime<Utc> { *self.now.lock().unwrap() }

    pub fn advance(&self, delta: TimeDelta) { *self.now.lock().unwrap() += delta; }

    /// Closure suitable for [`crate::SessionConfig::with_clock`].
    pub fn source(&self) -> impl Fn() -> DateTime<Utc> + Send + Sync + 'static {
        let clock = self.clone();
        move || clock.now()
    }
}
