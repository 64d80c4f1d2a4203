use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};

use crate::types::DisplaySkin;

/// Clock used to stamp `connected_at`.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Tunables of the session reconciler.
#[derive(Clone, derive_more::Debug)]
pub struct SessionConfig {
    pairing_timeout: Duration,
    adapter_timeout: Duration,
    directory_timeout: Duration,
    fetch_timeout: Duration,
    default_skin: DisplaySkin,
    #[debug(skip)]
    clock: Clock,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pairing_timeout: Duration::from_secs(120),
            adapter_timeout: Duration::from_secs(10),
            directory_timeout: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(15),
            default_skin: DisplaySkin::default(),
            clock: Arc::new(Utc::now),
        }
    }
}

impl SessionConfig {
    /// Ceiling for a user-initiated pairing, including the time the user
    /// spends in the extension's prompt.
    pub fn with_pairing_timeout(mut self, timeout: Duration) -> Self {
        self.pairing_timeout = timeout;
        self
    }

    /// Bound for non-interactive adapter calls (paired addresses, disconnect).
    pub fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    pub fn with_directory_timeout(mut self, timeout: Duration) -> Self {
        self.directory_timeout = timeout;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_default_skin(mut self, skin: DisplaySkin) -> Self {
        self.default_skin = skin;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn pairing_timeout(&self) -> Duration { self.pairing_timeout }

    pub fn adapter_timeout(&self) -> Duration { self.adapter_timeout }

    pub fn directory_timeout(&self) -> Duration { self.directory_timeout }

    pub fn fetch_timeout(&self) -> Duration { self.fetch_timeout }

    pub fn default_skin(&self) -> DisplaySkin { self.default_skin }

    pub fn now(&self) -> DateTime<Utc> { (self.clock)() }

    pub(crate) fn clock(&self) -> Clock { self.clock.clone() }
}
