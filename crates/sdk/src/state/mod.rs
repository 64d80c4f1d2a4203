//! Session model.
//!
//! Pure, synchronous bookkeeping of connected wallets. Every transition
//! returns [`Effects`] describing what the reconciler has to carry out
//! afterwards (persist, mirror, refresh); nothing here performs I/O.

mod pending;
mod session;
#[cfg(test)]
mod tests_prop;
mod wallet;

pub use pending::{PendingTicket, PendingWallet};
pub(crate) use session::PairingPrefs;
pub use session::{PersistedSession, SessionState};
pub use wallet::WalletRecord;

use crate::{directory::DirectoryOp, types::Address};

/// Follow-up work produced by a session transition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Effects {
    changed: bool,
    activated: Vec<Address>,
    removed: Vec<Address>,
    directory: Vec<DirectoryOp>,
}

impl Effects {
    /// Whether persisted state changed and has to be written.
    pub fn changed(&self) -> bool { self.changed }

    /// Addresses newly marked active, to refresh in the data cache.
    pub fn activated(&self) -> &[Address] { &self.activated }

    /// Addresses whose records were removed, to drop from the data cache.
    pub fn removed(&self) -> &[Address] { &self.removed }

    /// Operations to mirror into the remote directory.
    pub fn directory(&self) -> &[DirectoryOp] { &self.directory }

    pub(crate) fn into_parts(self) -> (Vec<Address>, Vec<Address>, Vec<DirectoryOp>) {
        (self.activated, self.removed, self.directory)
    }

    /// Forces a write and a data refresh of `addresses`.
    pub(crate) fn persist_and_refresh(addresses: Vec<Address>) -> Self {
        Self { changed: true, activated: addresses, ..Default::default() }
    }

    pub(crate) fn merge(&mut self, other: Effects) {
        self.changed |= other.changed;
        self.activated.extend(other.activated);
        self.removed.extend(other.removed);
        self.directory.extend(other.directory);
    }

    fn mark_changed(&mut self) { self.changed = true; }
}
