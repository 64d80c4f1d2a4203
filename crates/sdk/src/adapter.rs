//! Wallet extension adapter boundary.
//!
//! An adapter fronts one browser-extension pairing protocol. Each call may
//! be slow (extension round-trip, user prompt) and may fail; the
//! reconciler bounds every call with a timeout and never assumes
//! synchronous completion.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use futures::{Stream, stream::BoxStream};
use itertools::Itertools;

use crate::{
    error::{AdapterError, SessionError},
    types::{Address, WalletFamily},
};

/// Result of asking the user to pair a wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PairingResponse {
    /// Accounts the user approved, in the extension's order.
    Paired(Vec<Address>),
    /// User dismissed the prompt.
    Cancelled,
}

/// Unsolicited notification from an extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdapterEvent {
    Paired { family: WalletFamily, address: Address },
    Unpaired { family: WalletFamily, address: Address },
}

impl AdapterEvent {
    pub fn family(&self) -> WalletFamily {
        match self {
            AdapterEvent::Paired { family, .. } | AdapterEvent::Unpaired { family, .. } => *family,
        }
    }

    pub fn address(&self) -> &Address {
        match self {
            AdapterEvent::Paired { address, .. } | AdapterEvent::Unpaired { address, .. } => address,
        }
    }
}

#[async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Accounts the extension currently reports as paired for `family`.
    async fn paired_addresses(&self, family: WalletFamily) -> Result<Vec<Address>, AdapterError>;

    /// Opens the extension's pairing prompt for `family`.
    async fn request_pairing(&self, family: WalletFamily) -> Result<PairingResponse, AdapterError>;

    async fn disconnect(&self, family: WalletFamily, address: &Address) -> Result<(), AdapterError>;

    /// Stream of pair/unpair notifications for every family the adapter
    /// serves.
    fn events(&self) -> BoxStream<'static, AdapterEvent>;
}

/// Adapters by wallet family. One adapter may serve several families.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<WalletFamily, Arc<dyn WalletAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, family: WalletFamily, adapter: Arc<dyn WalletAdapter>) {
        self.adapters.insert(family, adapter);
    }

    pub fn get(&self, family: WalletFamily) -> Result<&Arc<dyn WalletAdapter>, SessionError> {
        self.adapters.get(&family).ok_or(SessionError::UnknownFamily(family))
    }

    pub fn families(&self) -> impl Iterator<Item = WalletFamily> + '_ { self.adapters.keys().copied() }

    pub fn iter(&self) -> impl Iterator<Item = (WalletFamily, &Arc<dyn WalletAdapter>)> {
        self.adapters.iter().map(|(family, adapter)| (*family, adapter))
    }

    pub fn is_empty(&self) -> bool { self.adapters.is_empty() }

    /// Notifications of all registered adapters, merged. Adapters shared
    /// between families are subscribed once.
    pub fn events(&self) -> impl Stream<Item = AdapterEvent> + Send + 'static {
        futures::stream::select_all(
            self.adapters
                .values()
                .unique_by(|adapter| Arc::as_ptr(adapter) as *const () as usize)
                .map(|adapter| adapter.events()),
        )
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.adapters.keys()).finish()
    }
}
