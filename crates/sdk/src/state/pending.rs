use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::types::{Address, DisplaySkin, WalletFamily, WalletId};

/// Identifies one connect attempt for the lifetime of the pending slot.
///
/// Completions carry the ticket they were issued with; a completion whose
/// ticket no longer matches the slot belongs to a superseded attempt and
/// is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("#{_0}")]
pub struct PendingTicket(pub(crate) u64);

/// Placeholder for a connect attempt the extension has not confirmed yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingWallet {
    ticket: PendingTicket,
    family: WalletFamily,
    skin: Option<DisplaySkin>,
    address: Option<Address>,
    target: Option<WalletId>,
    started_at: DateTime<Utc>,
    /// Addresses already live when the attempt began.
    live_at_start: HashSet<Address>,
}

impl PendingWallet {
    pub(crate) fn new(
        ticket: PendingTicket,
        family: WalletFamily,
        skin: Option<DisplaySkin>,
        target: Option<WalletId>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self { ticket, family, skin, address: None, target, started_at, live_at_start: HashSet::new() }
    }

    pub(crate) fn with_live(mut self, live: HashSet<Address>) -> Self {
        self.live_at_start = live;
        self
    }

    pub fn ticket(&self) -> PendingTicket { self.ticket }

    pub fn family(&self) -> WalletFamily { self.family }

    /// Skin picked before the extension confirmed, carried into the record.
    pub fn skin(&self) -> Option<DisplaySkin> { self.skin }

    /// Address returned by the extension, once pairing resolved.
    pub fn address(&self) -> Option<&Address> { self.address.as_ref() }

    /// Record being reconnected, `None` for a fresh connect.
    pub fn target(&self) -> Option<&WalletId> { self.target.as_ref() }

    pub fn started_at(&self) -> DateTime<Utc> { self.started_at }

    /// Whether `address` was already live when the attempt began, as
    /// opposed to having paired while the prompt was open.
    pub fn was_live_at_start(&self, address: &Address) -> bool { self.live_at_start.contains(address) }

    pub(crate) fn resolve(&mut self, address: Address) { self.address = Some(address); }
}
