use std::{
    collections::HashSet,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    directory::RemoteDirectory,
    error::DirectoryError,
    types::{Address, RemoteSessionEntry, UserId},
};

/// Directory kept in memory, one entry per address.
pub struct MemoryDirectory {
    entries: Mutex<Vec<RemoteSessionEntry>>,
    available: AtomicBool,
    rejected: Mutex<HashSet<Address>>,
    writes: AtomicUsize,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self {
            entries: Mutex::default(),
            available: AtomicBool::new(true),
            rejected: Mutex::default(),
            writes: AtomicUsize::new(0),
        }
    }
}

impl MemoryDirectory {
    pub fn with_entries(entries: impl IntoIterator<Item = RemoteSessionEntry>) -> Self {
        let directory = Self::default();
        entries.into_iter().for_each(|e| directory.insert(e));
        directory
    }

    /// While unavailable every request fails with
    /// [`DirectoryError::Unavailable`].
    pub fn set_available(&self, available: bool) { self.available.store(available, Ordering::SeqCst); }

    /// Writes for `address` fail with [`DirectoryError::Rejected`] from now on.
    pub fn reject(&self, address: &Address) { self.rejected.lock().unwrap().insert(address.clone()); }

    pub fn entries(&self) -> Vec<RemoteSessionEntry> { self.entries.lock().unwrap().clone() }

    pub fn entry(&self, address: &Address) -> Option<RemoteSessionEntry> {
        self.entries.lock().unwrap().iter().find(|e| &e.address == address).cloned()
    }

    /// Accepted write requests.
    pub fn writes(&self) -> usize { self.writes.load(Ordering::SeqCst) }

    /// Seeds an entry without counting it as a write.
    pub fn insert(&self, entry: RemoteSessionEntry) {
        let mut entries = self.entries.lock().unwrap();
        match entries.iter_mut().find(|e| e.address == entry.address) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    fn check(&self) -> Result<(), DirectoryError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DirectoryError::Unavailable("directory is offline".to_string()))
        }
    }

    fn check_write(&self, address: &Address) -> Result<(), DirectoryError> {
        self.check()?;
        if self.rejected.lock().unwrap().contains(address) {
            return Err(DirectoryError::Rejected(format!("address {} is not allowed", address)));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteDirectory for MemoryDirectory {
    async fn find_by_address(
        &self,
        address: &Address,
    ) -> Result<Option<RemoteSessionEntry>, DirectoryError> {
        self.check()?;
        Ok(self.entry(address))
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<RemoteSessionEntry>, DirectoryError> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| &e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert(&self, entry: &RemoteSessionEntry) -> Result<(), DirectoryError> {
        self.check_write(&entry.address)?;
        self.insert(entry.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_active(
        &self,
        user_id: &UserId,
        address: &Address,
        active: bool,
    ) -> Result<(), DirectoryError> {
        self.check_write(address)?;
        if let Some(entry) = self
            .entries
            .lock()
            .unwrap()
            .iter_mut()
            .find(|e| &e.address == address && &e.user_id == user_id)
        {
            entry.is_active = active;
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
