use std::{
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use crate::{error::StoreError, state::PersistedSession, store::SessionStore};

/// Store kept in memory. Writes can be made to fail as if the profile
/// storage quota were exhausted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    session: Mutex<Option<PersistedSession>>,
    fail_writes: AtomicBool,
    write_delay: Mutex<Duration>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn with(session: PersistedSession) -> Self {
        Self { session: Mutex::new(Some(session)), ..Default::default() }
    }

    pub fn fail_writes(&self, fail: bool) { self.fail_writes.store(fail, Ordering::SeqCst); }

    /// Makes every write block the calling thread for `delay`, like a slow
    /// disk.
    pub fn set_write_delay(&self, delay: Duration) { *self.write_delay.lock().unwrap() = delay; }

    /// Last successfully written session.
    pub fn saved(&self) -> Option<PersistedSession> { self.session.lock().unwrap().clone() }

    /// Successful writes so far.
    pub fn saves(&self) -> usize { self.saves.load(Ordering::SeqCst) }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Option<PersistedSession> { self.saved() }

    fn save(&self, session: &PersistedSession) -> Result<(), StoreError> {
        let delay = *self.write_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::QuotaExceeded);
        }
        *self.session.lock().unwrap() = Some(session.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
