use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{self, Address, DisplaySkin, WalletFamily, WalletId};

/// Browser-side record of a wallet known to the session.
///
/// A record outlives its pairing: when the extension stops reporting the
/// address the record is only marked inactive, and it is removed solely
/// by an explicit disconnect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    id: WalletId,
    address: Address,
    #[serde(rename = "walletFamily")]
    family: WalletFamily,
    display_skin: DisplaySkin,
    is_default: bool,
    is_active: bool,
    connected_at: DateTime<Utc>,
}

impl WalletRecord {
    pub fn new(
        family: WalletFamily,
        address: Address,
        display_skin: DisplaySkin,
        is_default: bool,
        is_active: bool,
        connected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: WalletId::derive(family, &address),
            address,
            family,
            display_skin,
            is_default,
            is_active,
            connected_at,
        }
    }

    /// Known-but-not-paired record restored from the remote directory.
    pub(crate) fn from_remote(entry: &types::RemoteSessionEntry, now: DateTime<Utc>) -> Self {
        Self::new(
            entry.wallet_family,
            entry.address.clone(),
            entry.display_skin,
            entry.is_default,
            false,
            now,
        )
    }

    pub fn id(&self) -> &WalletId { &self.id }

    pub fn address(&self) -> &Address { &self.address }

    pub fn family(&self) -> WalletFamily { self.family }

    pub fn display_skin(&self) -> DisplaySkin { self.display_skin }

    /// Whether the user marked this wallet as their default one.
    pub fn is_default(&self) -> bool { self.is_default }

    /// Whether the extension currently reports the address as paired.
    pub fn is_active(&self) -> bool { self.is_active }

    /// Time of the most recent successful pairing.
    pub fn connected_at(&self) -> DateTime<Utc> { self.connected_at }

    pub(crate) fn activate(&mut self, now: DateTime<Utc>) {
        self.is_active = true;
        self.connected_at = now;
    }

    pub(crate) fn deactivate(&mut self) { self.is_active = false; }

    pub(crate) fn set_default(&mut self, is_default: bool) { self.is_default = is_default; }

    pub(crate) fn set_skin(&mut self, skin: DisplaySkin) { self.display_skin = skin; }

    /// Projection of the record for the remote directory.
    pub fn to_remote(&self, user_id: &types::UserId) -> types::RemoteSessionEntry {
        types::RemoteSessionEntry {
            user_id: user_id.clone(),
            address: self.address.clone(),
            wallet_family: self.family,
            display_skin: self.display_skin,
            is_default: self.is_default,
            is_active: self.is_active,
        }
    }
}
