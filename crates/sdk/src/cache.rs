//! Per-wallet data cache.
//!
//! Last fetched balances, token holdings and transactions per address.
//! Entries are refreshed independently of each other and of the session:
//! a failing fetch for one wallet touches neither other entries nor the
//! session state, and cached data is never used to decide who is
//! connected.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fastnum::UD128;
use futures::{StreamExt, channel::mpsc::UnboundedReceiver};

use crate::{config::Clock, error::FetchError, types::Address};

/// Fungible token held by a wallet.
#[derive(Clone, PartialEq, derive_more::Debug)]
pub struct TokenHolding {
    pub token_id: String,
    pub symbol: String,
    #[debug("{amount}")]
    pub amount: UD128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferDirection {
    Incoming,
    Outgoing,
}

/// Recent transaction touching a wallet.
#[derive(Clone, PartialEq, derive_more::Debug)]
pub struct TransactionSummary {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub direction: TransferDirection,
    #[debug("{amount}")]
    pub amount: UD128,
}

/// Data fetched for one wallet.
#[derive(Clone, PartialEq, derive_more::Debug)]
pub struct WalletData {
    /// Native coin balance.
    #[debug("{balance}")]
    pub balance: UD128,
    pub tokens: Vec<TokenHolding>,
    pub transactions: Vec<TransactionSummary>,
}

/// Source of per-wallet data (mirror node, indexer, ...).
#[async_trait]
pub trait WalletDataSource: Send + Sync {
    async fn fetch(&self, address: &Address) -> Result<WalletData, FetchError>;
}

/// Cache slot of one wallet.
#[derive(Clone, Debug, Default)]
pub struct CacheEntry {
    data: Option<WalletData>,
    fetched_at: Option<DateTime<Utc>>,
    last_error: Option<FetchError>,
    refreshing: bool,
    /// Tracking epoch; a removed and re-tracked address gets a new one.
    generation: u64,
}

impl CacheEntry {
    /// Last successfully fetched data, kept across failed refreshes.
    pub fn data(&self) -> Option<&WalletData> { self.data.as_ref() }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> { self.fetched_at }

    /// Error of the latest refresh, if it failed.
    pub fn last_error(&self) -> Option<&FetchError> { self.last_error.as_ref() }

    pub fn is_refreshing(&self) -> bool { self.refreshing }
}

/// Shared handle to the cache; clones see the same entries.
#[derive(Clone, Debug, Default)]
pub struct WalletDataCache {
    entries: Arc<DashMap<Address, CacheEntry>>,
    generations: Arc<AtomicU64>,
}

impl WalletDataCache {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, address: &Address) -> Option<CacheEntry> {
        self.entries.get(address).map(|e| e.value().clone())
    }

    pub fn data(&self, address: &Address) -> Option<WalletData> {
        self.entries.get(address).and_then(|e| e.data.clone())
    }

    pub fn contains(&self, address: &Address) -> bool { self.entries.contains_key(address) }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Starts tracking `address`, keeping existing data if any.
    pub fn track(&self, address: &Address) {
        self.entries.entry(address.clone()).or_insert_with(|| CacheEntry {
            generation: self.generations.fetch_add(1, Ordering::Relaxed) + 1,
            ..Default::default()
        });
    }

    pub fn remove(&self, address: &Address) -> Option<CacheEntry> {
        self.entries.remove(address).map(|(_, entry)| entry)
    }

    /// Marks the entry as refreshing and returns its generation.
    fn begin_refresh(&self, address: &Address) -> Option<u64> {
        let mut entry = self.entries.get_mut(address)?;
        entry.refreshing = true;
        Some(entry.generation)
    }

    /// Stores a refresh result unless the entry was removed after the
    /// refresh began, whether or not the address was tracked again.
    fn complete(
        &self,
        address: &Address,
        generation: u64,
        result: Result<WalletData, FetchError>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(mut entry) = self.entries.get_mut(address) else {
            return false;
        };
        if entry.generation != generation {
            return false;
        }
        entry.refreshing = false;
        match result {
            Ok(data) => {
                entry.data = Some(data);
                entry.fetched_at = Some(now);
                entry.last_error = None;
            },
            Err(err) => entry.last_error = Some(err),
        }
        true
    }
}

/// Fetches data for tracked wallets, all addresses in parallel.
#[derive(Clone)]
pub struct CacheRefresher {
    cache: WalletDataCache,
    source: Arc<dyn WalletDataSource>,
    timeout: std::time::Duration,
    clock: Clock,
}

impl CacheRefresher {
    pub fn new(
        cache: WalletDataCache,
        source: Arc<dyn WalletDataSource>,
        config: &crate::config::SessionConfig,
    ) -> Self {
        Self { cache, source, timeout: config.fetch_timeout(), clock: config.clock() }
    }

    /// Refreshes a tracked address; untracked ones are skipped.
    pub async fn refresh(&self, address: Address) {
        let Some(generation) = self.cache.begin_refresh(&address) else {
            tracing::debug!(target: "cache", %address, "skipping refresh of untracked wallet");
            return;
        };
        let result = tokio::time::timeout(self.timeout, self.source.fetch(&address))
            .await
            .unwrap_or(Err(FetchError::Timeout));
        if let Err(err) = &result {
            tracing::warn!(target: "cache", %address, %err, "wallet data refresh failed");
        }
        if !self.cache.complete(&address, generation, result, (self.clock)()) {
            tracing::debug!(target: "cache", %address, "discarding data of disconnected wallet");
        }
    }

    /// Tracks and refreshes `addresses` concurrently.
    pub async fn refresh_all(&self, addresses: impl IntoIterator<Item = Address>) {
        let refreshes = addresses.into_iter().map(|address| {
            self.cache.track(&address);
            self.refresh(address)
        });
        futures::future::join_all(refreshes).await;
    }

    /// Serves refresh requests until the sending side is dropped.
    pub async fn run(self, requests: UnboundedReceiver<Address>) {
        requests.for_each_concurrent(None, |address| self.refresh(address)).await;
    }
}

#[cfg(feature = "display")]
impl std::fmt::Display for WalletData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use tabled::{Table, Tabled, settings::Style};

        #[derive(Tabled)]
        struct Row<'a> {
            #[tabled(rename = "Token")]
            token_id: &'a str,
            #[tabled(rename = "Symbol")]
            symbol: &'a str,
            #[tabled(rename = "Amount")]
            amount: String,
        }

        writeln!(f, "Balance: {} | Transactions: {}", self.balance, self.transactions.len())?;
        if !self.tokens.is_empty() {
            let mut table = Table::new(self.tokens.iter().map(|t| Row {
                token_id: &t.token_id,
                symbol: &t.symbol,
                amount: t.amount.to_string(),
            }));
            table.with(Style::sharp());
            writeln!(f, "{}", table)?;
        }
        Ok(())
    }
}
