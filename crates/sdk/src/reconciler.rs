//! Session reconciler.
//!
//! Owns the single [`SessionState`] and is its only writer. Signals from
//! the local store, the remote directory, the wallet extensions and the
//! user all funnel through here:
//!
//! - [`Reconciler::start`] resolves the initial session once per process:
//!   local state first, then the directory (only when nothing is stored
//!   locally and a user is known), then whatever the extensions report as
//!   paired.
//! - Intents ([`Reconciler::connect`], [`Reconciler::reconnect`],
//!   [`Reconciler::disconnect`], [`Reconciler::switch_active`],
//!   [`Reconciler::set_default`], [`Reconciler::update_skin`]) and
//!   extension notifications ([`Reconciler::handle_event`]) are applied
//!   one at a time under a single lock.
//!
//! Every mutating transition is followed, in order, by a write to the
//! local store, a batch for the [`DirectoryMirror`] and data refresh
//! requests for the [`CacheRefresher`]. The last two run in [`Background`]
//! and never hold up a transition.
//!
//! # Pending connects
//!
//! Only one connect attempt may be pending. A new attempt cancels the
//! previous one, whose pairing result, when it eventually arrives, is
//! dropped: completions are applied only while their [`PendingTicket`] is
//! still the one in the slot.

use std::{collections::HashSet, pin::pin, sync::Arc};

use futures::{
    Stream, StreamExt,
    channel::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use itertools::Itertools;
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    adapter::{AdapterEvent, AdapterRegistry, PairingResponse, WalletAdapter},
    cache::{CacheRefresher, WalletDataCache, WalletDataSource},
    config::SessionConfig,
    directory::{self, DirectoryMirror, DirectoryOp, RemoteDirectory},
    error::{AdapterError, SessionError},
    state::{Effects, PairingPrefs, PendingTicket, PendingWallet, PersistedSession, SessionState},
    store::SessionStore,
    types::{
        Address, ConnectOutcome, DisplaySkin, PairingFailure, RemoteSessionEntry, UserId,
        WalletFamily, WalletId,
    },
};

/// Builder of a [`Reconciler`] and its [`Background`] workers.
pub struct ReconcilerBuilder {
    config: SessionConfig,
    adapters: AdapterRegistry,
    store: Arc<dyn SessionStore>,
    directory: Arc<dyn RemoteDirectory>,
    data_source: Arc<dyn WalletDataSource>,
    cache: WalletDataCache,
}

impl ReconcilerBuilder {
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn RemoteDirectory>,
        data_source: Arc<dyn WalletDataSource>,
    ) -> Self {
        Self {
            config,
            adapters: AdapterRegistry::new(),
            store,
            directory,
            data_source,
            cache: WalletDataCache::new(),
        }
    }

    /// Registers `adapter` as the pairing backend of `family`.
    pub fn with_adapter(mut self, family: WalletFamily, adapter: Arc<dyn WalletAdapter>) -> Self {
        self.adapters.register(family, adapter);
        self
    }

    /// Shares an existing cache instead of a fresh one.
    pub fn with_cache(mut self, cache: WalletDataCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn build(self) -> (Reconciler, Background) {
        let (mirror_tx, mirror_rx) = mpsc::unbounded();
        let (refresh_tx, refresh_rx) = mpsc::unbounded();
        let (observers, _) = watch::channel(SessionState::new());

        let background = Background {
            mirror: DirectoryMirror::new(self.directory.clone(), self.config.directory_timeout()),
            mirror_rx,
            refresher: CacheRefresher::new(self.cache.clone(), self.data_source, &self.config),
            refresh_rx,
        };

        (
            Reconciler {
                config: self.config,
                adapters: self.adapters,
                store: self.store,
                directory: self.directory,
                cache: self.cache,
                inner: Mutex::new(Inner::default()),
                observers,
                mirror_tx,
                refresh_tx,
            },
            background,
        )
    }
}

/// Directory propagation and data refresh workers.
///
/// Both stop once the [`Reconciler`] is dropped and their queues drain.
pub struct Background {
    mirror: DirectoryMirror,
    mirror_rx: UnboundedReceiver<Vec<DirectoryOp>>,
    refresher: CacheRefresher,
    refresh_rx: UnboundedReceiver<Address>,
}

impl Background {
    pub async fn run(self) {
        futures::join!(self.mirror.run(self.mirror_rx), self.refresher.run(self.refresh_rx));
    }
}

#[derive(Default)]
struct Inner {
    session: SessionState,
    started: bool,
    next_ticket: u64,
    /// Cancellation handle of the attempt currently in the pending slot.
    pairing: Option<(PendingTicket, CancellationToken)>,
}

/// Outcome of waiting on the extension's pairing prompt.
enum Pairing {
    Paired(Vec<Address>),
    Ended(ConnectOutcome),
}

pub struct Reconciler {
    config: SessionConfig,
    adapters: AdapterRegistry,
    store: Arc<dyn SessionStore>,
    directory: Arc<dyn RemoteDirectory>,
    cache: WalletDataCache,
    inner: Mutex<Inner>,
    observers: watch::Sender<SessionState>,
    mirror_tx: UnboundedSender<Vec<DirectoryOp>>,
    refresh_tx: UnboundedSender<Address>,
}

impl Reconciler {
    pub fn config(&self) -> &SessionConfig { &self.config }

    pub fn adapters(&self) -> &AdapterRegistry { &self.adapters }

    pub fn cache(&self) -> &WalletDataCache { &self.cache }

    /// Latest published session.
    pub fn snapshot(&self) -> SessionState { self.observers.borrow().clone() }

    /// Receiver notified on every session change, pending slot included.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> { self.observers.subscribe() }

    /// Resolves the initial session. Runs once; later calls return the
    /// current session untouched.
    ///
    /// `known_user` is the identity from a previous login, used to recover
    /// the session from the directory when nothing is stored locally.
    pub async fn start(&self, known_user: Option<UserId>) -> SessionState {
        let mut inner = self.inner.lock().await;
        if inner.started {
            tracing::warn!(target: "session", "session already started");
            return inner.session.clone();
        }
        inner.started = true;

        let now = self.config.now();
        let mut effects = Effects::default();

        // Local state wins whenever there is any
        let mut session = match self.load().await.filter(|p| !p.is_empty()) {
            Some(persisted) => {
                tracing::debug!(target: "session", wallets = persisted.wallets.len(), "restoring local session");
                SessionState::from_persisted(persisted)
            },
            None => match &known_user {
                Some(user_id) => {
                    match directory::bounded(
                        self.config.directory_timeout(),
                        self.directory.list_by_user(user_id),
                    )
                    .await
                    {
                        Ok(entries) => {
                            tracing::debug!(target: "session", %user_id, wallets = entries.len(), "restoring session from directory");
                            SessionState::from_remote(user_id.clone(), &entries, now)
                        },
                        Err(err) => {
                            tracing::warn!(target: "session", %user_id, %err, "directory unavailable, starting without known wallets");
                            SessionState::new()
                        },
                    }
                },
                None => SessionState::new(),
            },
        };
        if session.user_id().is_none()
            && let Some(user_id) = known_user
        {
            effects.merge(session.set_user_id(user_id));
        }

        let (answered, paired) = self.paired_addresses().await;
        let mut live = HashSet::new();
        for (family, address) in paired {
            if !live.insert(address.clone()) {
                continue;
            }
            let remote = match session.wallet_by_address(&address) {
                Some(_) => None,
                None => self.lookup_address(&address).await,
            };
            let (_, paired) = session.apply_paired(
                family,
                &address,
                PairingPrefs { skin: None, remote: remote.as_ref(), default_skin: self.config.default_skin() },
                now,
            );
            effects.merge(paired);
            effects.merge(session.touch(&address, now));
        }
        // Wallets of families whose adapter did not answer keep their state
        let unknown = session
            .wallets()
            .iter()
            .filter(|r| !answered.contains(&r.family()))
            .map(|r| r.address().clone())
            .collect_vec();
        let keep = live.iter().cloned().chain(unknown).collect();
        effects.merge(session.sweep_inactive(&keep));

        let addresses = session.wallets().iter().map(|r| r.address().clone()).collect_vec();
        effects.merge(Effects::persist_and_refresh(addresses));

        tracing::info!(
            target: "session",
            wallets = session.wallets().len(),
            live = live.len(),
            active = ?session.active_wallet_id(),
            "session resolved"
        );
        inner.session = session;
        self.commit(&inner, effects).await;
        inner.session.clone()
    }

    /// Pairs a new wallet of `family`, carrying `skin` into the record if
    /// given.
    pub async fn connect(
        &self,
        family: WalletFamily,
        skin: Option<DisplaySkin>,
    ) -> Result<ConnectOutcome, SessionError> {
        let adapter = self.adapters.get(family)?.clone();
        let (ticket, token) = {
            let mut inner = self.inner.lock().await;
            self.begin_pending(&mut inner, family, skin, None)
        };

        let addresses = match self.await_pairing(adapter.as_ref(), family, &token).await {
            Pairing::Paired(addresses) => addresses,
            Pairing::Ended(outcome) => return Ok(self.end_pending(ticket, outcome).await),
        };
        // Multi-account approvals: the first account is the one connected
        let address = addresses[0].clone();

        let known = {
            let mut inner = self.inner.lock().await;
            if !inner.session.resolve_pending(ticket, &address) {
                return Ok(ConnectOutcome::Superseded);
            }
            let was_live = inner.session.pending().is_some_and(|p| p.was_live_at_start(&address));
            match inner.session.wallet_by_address(&address) {
                Some(record) if record.is_active() => {
                    // Live before this attempt started: nothing to connect.
                    // Live since then: an extension notification beat us to it.
                    let outcome = if was_live {
                        ConnectOutcome::AlreadyConnected(record.id().clone())
                    } else {
                        ConnectOutcome::Connected(record.clone())
                    };
                    self.finish_pending(&mut inner, ticket);
                    self.publish(&inner.session);
                    return Ok(outcome);
                },
                Some(_) => true,
                None => false,
            }
        };
        let remote = if known { None } else { self.lookup_address(&address).await };

        let mut inner = self.inner.lock().await;
        let Some(pending) = self.finish_pending(&mut inner, ticket) else {
            return Ok(ConnectOutcome::Superseded);
        };
        let (id, effects) = inner.session.apply_paired(
            family,
            &address,
            PairingPrefs {
                skin: pending.skin(),
                remote: remote.as_ref(),
                default_skin: self.config.default_skin(),
            },
            self.config.now(),
        );
        self.commit(&inner, effects).await;
        tracing::info!(target: "session", %family, %address, "wallet connected");
        Ok(inner
            .session
            .wallet(&id)
            .cloned()
            .map_or(ConnectOutcome::Superseded, ConnectOutcome::Connected))
    }

    /// Pairs a known, inactive wallet again.
    ///
    /// The extension must return the record's address; any other account
    /// is refused with [`PairingFailure::AddressMismatch`] and the record is
    /// left as it was.
    pub async fn reconnect(&self, id: &WalletId) -> Result<ConnectOutcome, SessionError> {
        let (family, expected, adapter, ticket, token) = {
            let mut inner = self.inner.lock().await;
            let record = inner
                .session
                .wallet(id)
                .ok_or_else(|| SessionError::UnknownWallet(id.clone()))?;
            if record.is_active() {
                return Ok(ConnectOutcome::AlreadyConnected(id.clone()));
            }
            let (family, expected, skin) = (record.family(), record.address().clone(), record.display_skin());
            let adapter = self.adapters.get(family)?.clone();
            let (ticket, token) = self.begin_pending(&mut inner, family, Some(skin), Some(id.clone()));
            (family, expected, adapter, ticket, token)
        };

        let addresses = match self.await_pairing(adapter.as_ref(), family, &token).await {
            Pairing::Paired(addresses) => addresses,
            Pairing::Ended(outcome) => return Ok(self.end_pending(ticket, outcome).await),
        };
        if !addresses.contains(&expected) {
            tracing::warn!(target: "session", %expected, actual = %addresses[0], "reconnect paired a different account");
            let failure = PairingFailure::AddressMismatch { expected, actual: addresses[0].clone() };
            return Ok(self.end_pending(ticket, ConnectOutcome::Failed(failure)).await);
        }

        let mut inner = self.inner.lock().await;
        if self.finish_pending(&mut inner, ticket).is_none() {
            return Ok(ConnectOutcome::Superseded);
        }
        let (id, effects) = inner.session.apply_paired(
            family,
            &expected,
            PairingPrefs { skin: None, remote: None, default_skin: self.config.default_skin() },
            self.config.now(),
        );
        self.commit(&inner, effects).await;
        tracing::info!(target: "session", %family, address = %expected, "wallet reconnected");
        Ok(inner
            .session
            .wallet(&id)
            .cloned()
            .map_or(ConnectOutcome::Superseded, ConnectOutcome::Connected))
    }

    /// Forgets the wallet: removes its record and cached data, then asks the
    /// extension to unpair it.
    pub async fn disconnect(&self, id: &WalletId) -> Result<(), SessionError> {
        let (family, address) = {
            let mut inner = self.inner.lock().await;
            let record = inner
                .session
                .wallet(id)
                .ok_or_else(|| SessionError::UnknownWallet(id.clone()))?;
            let (family, address) = (record.family(), record.address().clone());
            let reconnecting = inner.session.pending().is_some_and(|p| p.target() == Some(id));
            let effects = inner.session.remove(id)?;
            if reconnecting && let Some((_, token)) = inner.pairing.take() {
                token.cancel();
            }
            self.commit(&inner, effects).await;
            (family, address)
        };
        tracing::info!(target: "session", %family, %address, "wallet disconnected");

        if let Ok(adapter) = self.adapters.get(family) {
            let result =
                tokio::time::timeout(self.config.adapter_timeout(), adapter.disconnect(family, &address))
                    .await
                    .unwrap_or(Err(AdapterError::Timeout));
            if let Err(err) = result {
                tracing::warn!(target: "session", %family, %address, %err, "extension failed to unpair wallet");
            }
        }
        Ok(())
    }

    pub async fn switch_active(&self, id: &WalletId) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        let effects = inner.session.switch_active(id)?;
        self.commit(&inner, effects).await;
        Ok(())
    }

    pub async fn set_default(&self, id: &WalletId) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        let effects = inner.session.set_default(id)?;
        self.commit(&inner, effects).await;
        Ok(())
    }

    pub async fn update_skin(&self, id: &WalletId, skin: DisplaySkin) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        let effects = inner.session.update_skin(id, skin)?;
        self.commit(&inner, effects).await;
        Ok(())
    }

    /// Applies an unsolicited extension notification.
    pub async fn handle_event(&self, event: AdapterEvent) {
        tracing::debug!(target: "session", ?event, "extension notification");
        match event {
            AdapterEvent::Paired { family, address } => {
                let known = self.inner.lock().await.session.wallet_by_address(&address).is_some();
                let remote = if known { None } else { self.lookup_address(&address).await };

                let mut inner = self.inner.lock().await;
                // A fresh connect of the same family is most likely what
                // triggered the notification; its chosen skin applies.
                let pending = inner
                    .session
                    .pending()
                    .filter(|p| p.family() == family && p.target().is_none())
                    .map(|p| (p.ticket(), p.skin()));
                let (_, effects) = inner.session.apply_paired(
                    family,
                    &address,
                    PairingPrefs {
                        skin: pending.and_then(|(_, skin)| skin),
                        remote: remote.as_ref(),
                        default_skin: self.config.default_skin(),
                    },
                    self.config.now(),
                );
                if let Some((ticket, _)) = pending {
                    inner.session.resolve_pending(ticket, &address);
                }
                self.commit(&inner, effects).await;
            },
            AdapterEvent::Unpaired { address, .. } => {
                let mut inner = self.inner.lock().await;
                let effects = inner.session.apply_unpaired(&address);
                self.commit(&inner, effects).await;
            },
        }
    }

    /// Merged notification stream of all registered adapters.
    pub fn adapter_events(&self) -> impl Stream<Item = AdapterEvent> + Send + 'static {
        self.adapters.events()
    }

    /// Applies `events` until the stream ends or `cancellation` fires.
    pub async fn listen(
        &self,
        events: impl Stream<Item = AdapterEvent>,
        cancellation: CancellationToken,
    ) {
        let mut events = pin!(events);
        loop {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                event = events.next() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
            }
        }
    }

    fn begin_pending(
        &self,
        inner: &mut MutexGuard<'_, Inner>,
        family: WalletFamily,
        skin: Option<DisplaySkin>,
        target: Option<WalletId>,
    ) -> (PendingTicket, CancellationToken) {
        inner.next_ticket += 1;
        let ticket = PendingTicket(inner.next_ticket);
        let token = CancellationToken::new();
        if let Some((previous, previous_token)) = inner.pairing.replace((ticket, token.clone())) {
            tracing::debug!(target: "session", %previous, %ticket, "superseding pending connect");
            previous_token.cancel();
        }
        inner
            .session
            .begin_pending(PendingWallet::new(ticket, family, skin, target, self.config.now()));
        self.publish(&inner.session);
        (ticket, token)
    }

    /// Clears the pending slot if it still holds `ticket`.
    fn finish_pending(&self, inner: &mut MutexGuard<'_, Inner>, ticket: PendingTicket) -> Option<PendingWallet> {
        if inner.pairing.as_ref().is_some_and(|(current, _)| *current == ticket) {
            inner.pairing = None;
        }
        inner.session.take_pending(ticket)
    }

    /// Resolves an attempt that produced no wallet. An attempt that lost its
    /// slot in the meantime reports [`ConnectOutcome::Superseded`].
    async fn end_pending(&self, ticket: PendingTicket, outcome: ConnectOutcome) -> ConnectOutcome {
        let mut inner = self.inner.lock().await;
        if self.finish_pending(&mut inner, ticket).is_none() {
            return ConnectOutcome::Superseded;
        }
        self.publish(&inner.session);
        tracing::debug!(target: "session", %ticket, %outcome, "connect attempt ended");
        outcome
    }

    async fn await_pairing(
        &self,
        adapter: &dyn WalletAdapter,
        family: WalletFamily,
        token: &CancellationToken,
    ) -> Pairing {
        tokio::select! {
            biased;
            _ = token.cancelled() => Pairing::Ended(ConnectOutcome::Superseded),
            result = tokio::time::timeout(self.config.pairing_timeout(), adapter.request_pairing(family)) => {
                match result {
                    Err(_) | Ok(Err(AdapterError::Timeout)) => {
                        Pairing::Ended(ConnectOutcome::Failed(PairingFailure::Timeout))
                    },
                    Ok(Err(err)) => {
                        tracing::warn!(target: "session", %family, %err, "pairing failed");
                        Pairing::Ended(ConnectOutcome::Failed(PairingFailure::Rejected(err.to_string())))
                    },
                    Ok(Ok(PairingResponse::Cancelled)) => Pairing::Ended(ConnectOutcome::Cancelled),
                    Ok(Ok(PairingResponse::Paired(addresses))) if addresses.is_empty() => {
                        Pairing::Ended(ConnectOutcome::Failed(PairingFailure::NoAddress))
                    },
                    Ok(Ok(PairingResponse::Paired(addresses))) => Pairing::Paired(addresses),
                }
            },
        }
    }

    /// Addresses currently paired according to every registered adapter,
    /// along with the families whose adapter answered. Adapters that fail or
    /// time out contribute nothing.
    async fn paired_addresses(&self) -> (HashSet<WalletFamily>, Vec<(WalletFamily, Address)>) {
        let queries = self.adapters.iter().map(|(family, adapter)| async move {
            let result =
                tokio::time::timeout(self.config.adapter_timeout(), adapter.paired_addresses(family))
                    .await
                    .unwrap_or(Err(AdapterError::Timeout));
            match result {
                Ok(addresses) => Some((family, addresses)),
                Err(err) => {
                    tracing::warn!(target: "session", %family, %err, "failed to query paired wallets");
                    None
                },
            }
        });
        let answers = futures::future::join_all(queries).await.into_iter().flatten().collect_vec();
        let answered = answers.iter().map(|(family, _)| *family).collect();
        let paired = answers
            .into_iter()
            .flat_map(|(family, addresses)| addresses.into_iter().map(move |a| (family, a)))
            .collect();
        (answered, paired)
    }

    async fn lookup_address(&self, address: &Address) -> Option<RemoteSessionEntry> {
        match directory::bounded(self.config.directory_timeout(), self.directory.find_by_address(address))
            .await
        {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(target: "session", %address, %err, "directory lookup failed");
                None
            },
        }
    }

    /// Carries out the follow-up of a transition: persist, mirror, refresh,
    /// then notify observers.
    ///
    /// Runs under the transition lock, so stored documents land in
    /// transition order.
    async fn commit(&self, inner: &Inner, effects: Effects) {
        if effects.changed() {
            self.persist(inner.session.persisted()).await;
            let (activated, removed, directory) = effects.into_parts();
            for address in &removed {
                self.cache.remove(address);
            }
            // Sent even when empty so that the mirror retries its backlog
            if self.mirror_tx.unbounded_send(directory).is_err() {
                tracing::debug!(target: "session", "directory mirror is not running");
            }
            for address in activated.into_iter().unique() {
                self.cache.track(&address);
                if self.refresh_tx.unbounded_send(address).is_err() {
                    tracing::debug!(target: "session", "cache refresher is not running");
                }
            }
        }
        self.publish(&inner.session);
    }

    /// Store reads and writes hit the disk; they run on the blocking pool.
    async fn load(&self) -> Option<PersistedSession> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.load()).await.unwrap_or_else(|err| {
            tracing::error!(target: "session", %err, "session store read panicked");
            None
        })
    }

    async fn persist(&self, session: PersistedSession) {
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || store.save(&session)).await {
            Ok(Ok(())) => {},
            Ok(Err(err)) => {
                tracing::warn!(target: "session", %err, "failed to persist session, keeping it in memory")
            },
            Err(err) => tracing::error!(target: "session", %err, "session store write panicked"),
        }
    }

    fn publish(&self, session: &SessionState) { self.observers.send_replace(session.clone()); }
}
