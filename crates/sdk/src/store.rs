//! Local session persistence.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use crate::{error::StoreError, state::PersistedSession};

/// Profile-scoped key-value persistence of the session.
///
/// Read once at startup, written after every change.
pub trait SessionStore: Send + Sync {
    /// Returns `None` when nothing is stored or the stored data cannot be
    /// read; a broken store must not prevent the session from starting.
    fn load(&self) -> Option<PersistedSession>;

    fn save(&self, session: &PersistedSession) -> Result<(), StoreError>;
}

/// Session stored as a JSON document in a file.
///
/// Writes go through a sibling temporary file followed by a rename, so a
/// crash mid-write leaves the previous session in place.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &Path { &self.path }
}

impl SessionStore for JsonFileStore {
    fn load(&self) -> Option<PersistedSession> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(target: "store", path = %self.path.display(), "no stored session");
                return None;
            },
            Err(err) => {
                tracing::warn!(target: "store", path = %self.path.display(), %err, "failed to read stored session");
                return None;
            },
        };
        match serde_json::from_slice(&bytes) {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::warn!(target: "store", path = %self.path.display(), %err, "ignoring malformed stored session");
                None
            },
        }
    }

    fn save(&self, session: &PersistedSession) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(session)?;
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
