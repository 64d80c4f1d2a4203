use std::collections::HashSet;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{Effects, PendingTicket, PendingWallet, WalletRecord};
use crate::{
    directory::DirectoryOp,
    error::SessionError,
    types::{Address, DisplaySkin, RemoteSessionEntry, UserId, WalletFamily, WalletId},
};

/// On-disk shape of the session, as written to the local store.
///
/// The pending slot is transient and never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub wallets: Vec<WalletRecord>,
    #[serde(default)]
    pub active_wallet_id: Option<WalletId>,
}

impl PersistedSession {
    pub fn is_empty(&self) -> bool { self.wallets.is_empty() }
}

/// Preferences applied to a record created by a pairing.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PairingPrefs<'a> {
    /// Skin chosen by the user before pairing completed.
    pub skin: Option<DisplaySkin>,
    /// Directory entry found for the paired address.
    pub remote: Option<&'a RemoteSessionEntry>,
    pub default_skin: DisplaySkin,
}

/// Canonical view of the connected wallets.
///
/// Invariants kept by every transition:
/// * addresses are unique across `wallets`, regardless of family;
/// * `active_wallet_id` is `None` iff `wallets` is empty, and otherwise
///   references a member;
/// * at most one record is default. Removing the default record does not
///   promote another one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    wallets: Vec<WalletRecord>,
    active_wallet_id: Option<WalletId>,
    pending: Option<PendingWallet>,
    user_id: Option<UserId>,
}

impl SessionState {
    pub fn new() -> Self { Self::default() }

    /// Adopts persisted state, repairing whatever violates the invariants:
    /// duplicate addresses and extra defaults are dropped (first wins), and
    /// a dangling active pointer is re-pointed.
    pub fn from_persisted(persisted: PersistedSession) -> Self {
        let mut state = Self { user_id: persisted.user_id, ..Default::default() };
        let mut seen = HashSet::new();
        let mut has_default = false;
        for record in persisted.wallets {
            if !seen.insert(record.address().clone()) {
                tracing::warn!(target: "session", address = %record.address(), "dropping duplicate wallet record");
                continue;
            }
            // IDs are re-derived, persisted ones are not trusted
            let mut record = WalletRecord::new(
                record.family(),
                record.address().clone(),
                record.display_skin(),
                record.is_default(),
                record.is_active(),
                record.connected_at(),
            );
            if record.is_default() {
                if has_default {
                    tracing::warn!(target: "session", address = %record.address(), "clearing extra default flag");
                    record.set_default(false);
                }
                has_default = true;
            }
            state.wallets.push(record);
        }
        state.active_wallet_id = persisted.active_wallet_id.filter(|id| state.wallet(id).is_some());
        state.repair_active_pointer();
        state
    }

    /// Known wallets of `user_id` as listed by the remote directory.
    /// None of them is considered paired until an adapter says so.
    pub(crate) fn from_remote(
        user_id: UserId,
        entries: &[RemoteSessionEntry],
        now: DateTime<Utc>,
    ) -> Self {
        Self::from_persisted(PersistedSession {
            user_id: Some(user_id),
            wallets: entries.iter().map(|e| WalletRecord::from_remote(e, now)).collect(),
            active_wallet_id: None,
        })
    }

    pub fn wallets(&self) -> &[WalletRecord] { &self.wallets }

    pub fn is_empty(&self) -> bool { self.wallets.is_empty() }

    pub fn wallet(&self, id: &WalletId) -> Option<&WalletRecord> {
        self.wallets.iter().find(|r| r.id() == id)
    }

    pub fn wallet_by_address(&self, address: &Address) -> Option<&WalletRecord> {
        self.wallets.iter().find(|r| r.address() == address)
    }

    pub fn active_wallet_id(&self) -> Option<&WalletId> { self.active_wallet_id.as_ref() }

    pub fn active_wallet(&self) -> Option<&WalletRecord> {
        self.active_wallet_id.as_ref().and_then(|id| self.wallet(id))
    }

    pub fn default_wallet(&self) -> Option<&WalletRecord> { self.wallets.iter().find(|r| r.is_default()) }

    pub fn pending(&self) -> Option<&PendingWallet> { self.pending.as_ref() }

    pub fn user_id(&self) -> Option<&UserId> { self.user_id.as_ref() }

    /// Checks the session invariants.
    pub fn is_consistent(&self) -> bool {
        let unique_addresses = self.wallets.iter().map(|r| r.address()).all_unique();
        let single_default = self.wallets.iter().filter(|r| r.is_default()).count() <= 1;
        let valid_pointer = match &self.active_wallet_id {
            None => self.wallets.is_empty(),
            Some(id) => self.wallet(id).is_some(),
        };
        unique_addresses && single_default && valid_pointer
    }

    pub fn persisted(&self) -> PersistedSession {
        PersistedSession {
            user_id: self.user_id.clone(),
            wallets: self.wallets.clone(),
            active_wallet_id: self.active_wallet_id.clone(),
        }
    }

    pub(crate) fn set_user_id(&mut self, user_id: UserId) -> Effects {
        let mut effects = Effects::default();
        if self.user_id.as_ref() != Some(&user_id) {
            self.user_id = Some(user_id);
            effects.mark_changed();
        }
        effects
    }

    /// Applies a confirmed pairing of `address`.
    ///
    /// Known addresses are reactivated in place, whatever family reported
    /// them; unknown ones get a new record. Re-applying the pairing of an
    /// already active address changes nothing.
    pub(crate) fn apply_paired(
        &mut self,
        family: WalletFamily,
        address: &Address,
        prefs: PairingPrefs<'_>,
        now: DateTime<Utc>,
    ) -> (WalletId, Effects) {
        let mut effects = Effects::default();

        if self.user_id.is_none() {
            let user_id = prefs
                .remote
                .map(|e| e.user_id.clone())
                .unwrap_or_else(|| UserId::derive_from(address));
            effects.merge(self.set_user_id(user_id));
        }

        let id = if let Some(record) = self.wallets.iter_mut().find(|r| r.address() == address) {
            let id = record.id().clone();
            if !record.is_active() {
                record.activate(now);
                effects.mark_changed();
                effects.activated.push(address.clone());
                effects.directory.extend(self.mirror_active(address, true));
            }
            id
        } else {
            let has_default = self.wallets.iter().any(|r| r.is_default());
            let is_default =
                self.wallets.is_empty() || (!has_default && prefs.remote.is_some_and(|e| e.is_default));
            let skin = prefs
                .skin
                .or(prefs.remote.map(|e| e.display_skin))
                .unwrap_or(prefs.default_skin);
            let record = WalletRecord::new(family, address.clone(), skin, is_default, true, now);
            let id = record.id().clone();
            self.wallets.push(record);
            effects.mark_changed();
            effects.activated.push(address.clone());
            effects.directory.extend(self.mirror_upsert(&id));
            id
        };

        if self.active_wallet_id.is_none() {
            self.active_wallet_id = Some(id.clone());
            effects.mark_changed();
        }

        (id, effects)
    }

    /// Restamps the pairing time of an active record reported live again.
    pub(crate) fn touch(&mut self, address: &Address, now: DateTime<Utc>) -> Effects {
        let mut effects = Effects::default();
        if let Some(record) = self.wallets.iter_mut().find(|r| r.address() == address)
            && record.is_active()
            && record.connected_at() != now
        {
            record.activate(now);
            effects.mark_changed();
        }
        effects
    }

    /// Applies the extension no longer reporting `address` as paired.
    ///
    /// The record is kept. If it was the active wallet, the pointer moves
    /// to the longest-connected live record; with no live record left it
    /// stays where it is.
    pub(crate) fn apply_unpaired(&mut self, address: &Address) -> Effects {
        let mut effects = Effects::default();
        let Some(record) = self.wallets.iter_mut().find(|r| r.address() == address) else {
            return effects;
        };
        if !record.is_active() {
            return effects;
        }
        record.deactivate();
        let id = record.id().clone();
        effects.mark_changed();
        effects.directory.extend(self.mirror_active(address, false));

        if self.active_wallet_id.as_ref() == Some(&id)
            && let Some(next) = earliest_connected(self.wallets.iter().filter(|r| r.is_active()))
        {
            self.active_wallet_id = Some(next.id().clone());
        }
        effects
    }

    /// Marks every active record whose address is not in `live` inactive.
    pub(crate) fn sweep_inactive(&mut self, live: &HashSet<Address>) -> Effects {
        let stale = self
            .wallets
            .iter()
            .filter(|r| r.is_active() && !live.contains(r.address()))
            .map(|r| r.address().clone())
            .collect_vec();
        let mut effects = Effects::default();
        for address in stale {
            effects.merge(self.apply_unpaired(&address));
        }
        effects
    }

    /// Removes the record entirely (explicit user disconnect).
    pub(crate) fn remove(&mut self, id: &WalletId) -> Result<Effects, SessionError> {
        let index = self
            .wallets
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| SessionError::UnknownWallet(id.clone()))?;
        let record = self.wallets.remove(index);

        let mut effects = Effects::default();
        effects.mark_changed();
        effects.removed.push(record.address().clone());
        if let Some(user_id) = &self.user_id {
            let mut entry = record.to_remote(user_id);
            entry.is_active = false;
            entry.is_default = false;
            effects.directory.push(DirectoryOp::Upsert(entry));
        }

        if self.active_wallet_id.as_ref() == Some(id) {
            self.active_wallet_id = earliest_connected(self.wallets.iter().filter(|r| r.is_active()))
                .or_else(|| earliest_connected(self.wallets.iter()))
                .map(|r| r.id().clone());
        }
        if self.pending.as_ref().is_some_and(|p| p.target() == Some(id)) {
            self.pending = None;
        }
        Ok(effects)
    }

    pub(crate) fn switch_active(&mut self, id: &WalletId) -> Result<Effects, SessionError> {
        self.require(id)?;
        let mut effects = Effects::default();
        if self.active_wallet_id.as_ref() != Some(id) {
            self.active_wallet_id = Some(id.clone());
            effects.mark_changed();
        }
        Ok(effects)
    }

    pub(crate) fn set_default(&mut self, id: &WalletId) -> Result<Effects, SessionError> {
        self.require(id)?;
        let mut effects = Effects::default();
        let mut updated = Vec::new();
        for record in self.wallets.iter_mut() {
            let is_target = record.id() == id;
            if record.is_default() != is_target {
                record.set_default(is_target);
                updated.push(record.id().clone());
            }
        }
        for updated_id in &updated {
            effects.mark_changed();
            effects.directory.extend(self.mirror_upsert(updated_id));
        }
        Ok(effects)
    }

    pub(crate) fn update_skin(&mut self, id: &WalletId, skin: DisplaySkin) -> Result<Effects, SessionError> {
        self.require(id)?;
        let mut effects = Effects::default();
        if let Some(record) = self.wallets.iter_mut().find(|r| r.id() == id)
            && record.display_skin() != skin
        {
            record.set_skin(skin);
            effects.mark_changed();
            effects.directory.extend(self.mirror_upsert(id));
        }
        Ok(effects)
    }

    /// Fills the pending slot, snapshotting which addresses are live right
    /// now. Returns the attempt it displaced.
    pub(crate) fn begin_pending(&mut self, pending: PendingWallet) -> Option<PendingWallet> {
        let live = self.wallets.iter().filter(|r| r.is_active()).map(|r| r.address().clone()).collect();
        self.pending.replace(pending.with_live(live))
    }

    pub(crate) fn is_pending_current(&self, ticket: PendingTicket) -> bool {
        self.pending.as_ref().is_some_and(|p| p.ticket() == ticket)
    }

    /// Records the address the extension returned for the current attempt.
    pub(crate) fn resolve_pending(&mut self, ticket: PendingTicket, address: &Address) -> bool {
        match self.pending.as_mut() {
            Some(pending) if pending.ticket() == ticket => {
                pending.resolve(address.clone());
                true
            },
            _ => false,
        }
    }

    /// Clears the pending slot if it still holds `ticket`.
    pub(crate) fn take_pending(&mut self, ticket: PendingTicket) -> Option<PendingWallet> {
        if self.is_pending_current(ticket) { self.pending.take() } else { None }
    }

    fn require(&self, id: &WalletId) -> Result<&WalletRecord, SessionError> {
        self.wallet(id).ok_or_else(|| SessionError::UnknownWallet(id.clone()))
    }

    fn repair_active_pointer(&mut self) {
        if self.active_wallet_id.as_ref().is_some_and(|id| self.wallet(id).is_some()) {
            return;
        }
        self.active_wallet_id = earliest_connected(self.wallets.iter().filter(|r| r.is_active()))
            .or_else(|| earliest_connected(self.wallets.iter()))
            .map(|r| r.id().clone());
    }

    fn mirror_upsert(&self, id: &WalletId) -> Option<DirectoryOp> {
        let user_id = self.user_id.as_ref()?;
        self.wallet(id).map(|r| DirectoryOp::Upsert(r.to_remote(user_id)))
    }

    fn mirror_active(&self, address: &Address, active: bool) -> Option<DirectoryOp> {
        self.user_id.as_ref().map(|user_id| DirectoryOp::SetActive {
            user_id: user_id.clone(),
            address: address.clone(),
            active,
        })
    }
}

/// Longest-connected record, ties broken by ID.
fn earliest_connected<'a>(
    records: impl Iterator<Item = &'a WalletRecord>,
) -> Option<&'a WalletRecord> {
    records.min_by(|a, b| a.connected_at().cmp(&b.connected_at()).then_with(|| a.id().cmp(b.id())))
}

#[cfg(feature = "display")]
impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use colored::Colorize;
        use tabled::{Table, Tabled, settings::Style};

        #[derive(Tabled)]
        struct WalletRow {
            #[tabled(rename = "")]
            marker: String,
            #[tabled(rename = "ID")]
            id: String,
            #[tabled(rename = "Family")]
            family: String,
            #[tabled(rename = "Address")]
            address: String,
            #[tabled(rename = "Skin")]
            skin: String,
            #[tabled(rename = "Default")]
            default: String,
            #[tabled(rename = "Status")]
            status: String,
            #[tabled(rename = "Connected At")]
            connected_at: String,
        }

        writeln!(
            f,
            "{} {}",
            "Session".blue(),
            match &self.user_id {
                Some(user_id) => format!("of user {}", user_id),
                None => "(anonymous)".to_string(),
            }
        )?;
        if let Some(pending) = &self.pending {
            writeln!(
                f,
                "    {} {} {}",
                "Connecting".yellow(),
                pending.family(),
                pending.address().map(|a| a.to_string()).unwrap_or_default()
            )?;
        }
        if self.wallets.is_empty() {
            return writeln!(f, "    {}", "No wallets connected".dimmed());
        }

        let rows = self.wallets.iter().map(|r| WalletRow {
            marker: if self.active_wallet_id.as_ref() == Some(r.id()) { "▶".to_string() } else { String::new() },
            id: format!("{:#}", r.id()),
            family: r.family().to_string(),
            address: r.address().to_string(),
            skin: r.display_skin().to_string(),
            default: if r.is_default() { "★".yellow().to_string() } else { String::new() },
            status: if r.is_active() { "live".green().to_string() } else { "idle".dimmed().to_string() },
            connected_at: r.connected_at().format("%Y-%m-%d %H:%M:%S").to_string(),
        });
        let mut table = Table::new(rows);
        table.with(Style::sharp());
        writeln!(f, "{}", table)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap() }

    fn prefs() -> PairingPrefs<'static> {
        PairingPrefs { skin: None, remote: None, default_skin: DisplaySkin::Classic }
    }

    fn pair(state: &mut SessionState, address: &str, secs: i64) -> WalletId {
        state.apply_paired(WalletFamily::HashPack, &Address::from(address), prefs(), at(secs)).0
    }

    #[test]
    fn first_pairing_becomes_default_and_active() {
        let mut state = SessionState::new();
        let (id, effects) = state.apply_paired(
            WalletFamily::HashPack,
            &Address::from("0.0.222"),
            PairingPrefs { skin: Some(DisplaySkin::Frost), ..prefs() },
            at(0),
        );

        assert_eq!(state.wallets().len(), 1);
        let record = state.wallet(&id).unwrap();
        assert!(record.is_default());
        assert!(record.is_active());
        assert_eq!(record.display_skin(), DisplaySkin::Frost);
        assert_eq!(state.active_wallet_id(), Some(&id));
        assert!(effects.changed());
        assert_eq!(effects.activated(), &[Address::from("0.0.222")]);
        assert_eq!(state.user_id(), Some(&UserId::derive_from(&Address::from("0.0.222"))));
        assert!(matches!(effects.directory(), [DirectoryOp::Upsert(entry)] if entry.is_default));
        assert!(state.is_consistent());
    }

    #[test]
    fn second_pairing_is_not_default_and_keeps_active_pointer() {
        let mut state = SessionState::new();
        let first = pair(&mut state, "0.0.111", 0);
        let second = pair(&mut state, "0.0.222", 1);

        assert!(!state.wallet(&second).unwrap().is_default());
        assert_eq!(state.active_wallet_id(), Some(&first));
        assert!(state.is_consistent());
    }

    #[test]
    fn repeated_pairing_is_idempotent() {
        let mut state = SessionState::new();
        pair(&mut state, "0.0.111", 0);
        let once = state.clone();
        let (_, effects) =
            state.apply_paired(WalletFamily::HashPack, &Address::from("0.0.111"), prefs(), at(50));

        assert_eq!(state, once);
        assert_eq!(effects, Effects::default());
    }

    #[test]
    fn same_address_from_another_family_updates_existing_record() {
        let mut state = SessionState::new();
        let id = pair(&mut state, "0.0.111", 0);
        state.apply_unpaired(&Address::from("0.0.111"));
        let (other, effects) =
            state.apply_paired(WalletFamily::Blade, &Address::from("0.0.111"), prefs(), at(10));

        assert_eq!(other, id);
        assert_eq!(state.wallets().len(), 1);
        assert!(state.wallet(&id).unwrap().is_active());
        assert_eq!(state.wallet(&id).unwrap().connected_at(), at(10));
        assert_eq!(effects.activated(), &[Address::from("0.0.111")]);
    }

    #[test]
    fn unpair_keeps_record_and_moves_pointer_to_longest_connected_live_wallet() {
        let mut state = SessionState::new();
        let first = pair(&mut state, "0.0.111", 0);
        let second = pair(&mut state, "0.0.222", 5);
        let third = pair(&mut state, "0.0.333", 3);

        let effects = state.apply_unpaired(&Address::from("0.0.111"));
        assert!(effects.changed());
        assert_eq!(state.wallets().len(), 3);
        assert!(!state.wallet(&first).unwrap().is_active());
        assert_eq!(state.active_wallet_id(), Some(&third));

        // Unpairing a record that is not active leaves the pointer alone
        state.apply_unpaired(&Address::from("0.0.222"));
        assert_eq!(state.active_wallet_id(), Some(&third));
        assert!(!state.wallet(&second).unwrap().is_active());
        assert!(state.is_consistent());
    }

    #[test]
    fn unpairing_last_live_wallet_keeps_pointer_on_it() {
        let mut state = SessionState::new();
        let id = pair(&mut state, "0.0.111", 0);
        state.apply_unpaired(&Address::from("0.0.111"));

        assert_eq!(state.active_wallet_id(), Some(&id));
        assert!(state.is_consistent());
        assert_eq!(state.apply_unpaired(&Address::from("0.0.111")), Effects::default());
        assert_eq!(state.apply_unpaired(&Address::from("0.0.999")), Effects::default());
    }

    #[test]
    fn removing_default_wallet_leaves_no_default() {
        let mut state = SessionState::new();
        let first = pair(&mut state, "0.0.111", 0);
        let second = pair(&mut state, "0.0.222", 1);

        let effects = state.remove(&first).unwrap();
        assert_eq!(effects.removed(), &[Address::from("0.0.111")]);
        assert_eq!(state.wallets().len(), 1);
        assert!(state.default_wallet().is_none());
        assert_eq!(state.active_wallet_id(), Some(&second));
        assert!(state.is_consistent());

        state.remove(&second).unwrap();
        assert!(state.is_empty());
        assert_eq!(state.active_wallet_id(), None);
        assert_eq!(state.remove(&second), Err(SessionError::UnknownWallet(second)));
    }

    #[test]
    fn removing_active_wallet_prefers_live_records() {
        let mut state = SessionState::new();
        let first = pair(&mut state, "0.0.111", 0);
        pair(&mut state, "0.0.222", 1);
        let third = pair(&mut state, "0.0.333", 2);
        state.apply_unpaired(&Address::from("0.0.222"));

        state.remove(&first).unwrap();
        assert_eq!(state.active_wallet_id(), Some(&third));
    }

    #[test]
    fn set_default_moves_the_single_default() {
        let mut state = SessionState::new();
        let first = pair(&mut state, "0.0.111", 0);
        let second = pair(&mut state, "0.0.222", 1);

        let effects = state.set_default(&second).unwrap();
        assert!(!state.wallet(&first).unwrap().is_default());
        assert!(state.wallet(&second).unwrap().is_default());
        assert_eq!(effects.directory().len(), 2);
        assert_eq!(state.set_default(&second).unwrap(), Effects::default());
        assert!(state.is_consistent());
    }

    #[test]
    fn switch_and_skin_require_known_wallet() {
        let mut state = SessionState::new();
        let id = pair(&mut state, "0.0.111", 0);
        let unknown = WalletId::derive(WalletFamily::Kabila, &Address::from("0.0.1"));

        assert!(state.switch_active(&unknown).is_err());
        assert!(state.update_skin(&unknown, DisplaySkin::Ember).is_err());
        assert!(state.update_skin(&id, DisplaySkin::Ember).unwrap().changed());
        assert_eq!(state.wallet(&id).unwrap().display_skin(), DisplaySkin::Ember);
        assert!(!state.switch_active(&id).unwrap().changed());
    }

    #[test]
    fn remote_preferences_apply_to_new_records() {
        let mut state = SessionState::new();
        pair(&mut state, "0.0.111", 0);
        state.apply_unpaired(&Address::from("0.0.111"));
        let first = state.wallets()[0].id().clone();
        state.set_default(&first).unwrap();

        let remote = RemoteSessionEntry {
            user_id: UserId::new("someone-else"),
            address: Address::from("0.0.222"),
            wallet_family: WalletFamily::Blade,
            display_skin: DisplaySkin::Midnight,
            is_default: true,
            is_active: false,
        };
        let (id, _) = state.apply_paired(
            WalletFamily::Blade,
            &Address::from("0.0.222"),
            PairingPrefs { remote: Some(&remote), ..prefs() },
            at(1),
        );
        let record = state.wallet(&id).unwrap();
        assert_eq!(record.display_skin(), DisplaySkin::Midnight);
        // A default already exists
        assert!(!record.is_default());
        // Identity was already known
        assert_ne!(state.user_id(), Some(&remote.user_id));
    }

    #[test]
    fn persisted_state_is_normalised() {
        let a = WalletRecord::new(WalletFamily::HashPack, Address::from("0.0.1"), DisplaySkin::Classic, true, true, at(0));
        let dup = WalletRecord::new(WalletFamily::Blade, Address::from("0.0.1"), DisplaySkin::Frost, false, true, at(1));
        let b = WalletRecord::new(WalletFamily::Kabila, Address::from("0.0.2"), DisplaySkin::Classic, true, false, at(2));
        let state = SessionState::from_persisted(PersistedSession {
            user_id: None,
            wallets: vec![a.clone(), dup, b.clone()],
            active_wallet_id: Some(WalletId::derive(WalletFamily::Blade, &Address::from("0.0.9"))),
        });

        assert_eq!(state.wallets().len(), 2);
        assert_eq!(state.wallet_by_address(&Address::from("0.0.1")).unwrap().family(), WalletFamily::HashPack);
        assert!(!state.wallet(b.id()).unwrap().is_default());
        assert_eq!(state.active_wallet_id(), Some(a.id()));
        assert!(state.is_consistent());
    }

    #[test]
    fn sweep_marks_unreported_wallets_inactive() {
        let mut state = SessionState::new();
        let first = pair(&mut state, "0.0.111", 0);
        let second = pair(&mut state, "0.0.222", 1);

        let live = HashSet::from([Address::from("0.0.222")]);
        let effects = state.sweep_inactive(&live);
        assert!(effects.changed());
        assert!(!state.wallet(&first).unwrap().is_active());
        assert!(state.wallet(&second).unwrap().is_active());
        assert_eq!(state.active_wallet_id(), Some(&second));
    }

    #[test]
    fn pending_slot_honours_tickets() {
        let mut state = SessionState::new();
        let first = PendingTicket(1);
        let second = PendingTicket(2);
        state.begin_pending(PendingWallet::new(first, WalletFamily::HashPack, None, None, at(0)));
        let displaced =
            state.begin_pending(PendingWallet::new(second, WalletFamily::Blade, None, None, at(1)));

        assert_eq!(displaced.map(|p| p.ticket()), Some(first));
        assert!(!state.resolve_pending(first, &Address::from("0.0.1")));
        assert!(state.take_pending(first).is_none());
        assert!(state.resolve_pending(second, &Address::from("0.0.2")));
        assert_eq!(state.pending().and_then(|p| p.address()), Some(&Address::from("0.0.2")));
        assert!(state.take_pending(second).is_some());
        assert!(state.pending().is_none());
    }

    #[test]
    fn pending_slot_remembers_who_was_live_at_start() {
        let mut state = SessionState::new();
        pair(&mut state, "0.0.1", 0);
        pair(&mut state, "0.0.2", 0);
        state.apply_unpaired(&Address::from("0.0.2"));

        // Same instant as the pairings: only membership decides
        state.begin_pending(PendingWallet::new(PendingTicket(1), WalletFamily::Blade, None, None, at(0)));
        pair(&mut state, "0.0.3", 0);

        let pending = state.pending().unwrap();
        assert!(pending.was_live_at_start(&Address::from("0.0.1")));
        assert!(!pending.was_live_at_start(&Address::from("0.0.2")));
        assert!(!pending.was_live_at_start(&Address::from("0.0.3")));
    }
}
