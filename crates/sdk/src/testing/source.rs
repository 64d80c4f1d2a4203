use async_trait::async_trait;
use dashmap::DashMap;
use fastnum::UD128;

use crate::{
    cache::{WalletData, WalletDataSource},
    error::FetchError,
    types::Address,
};

/// Data source answering from per-address fixtures. Addresses without a
/// fixture hold nothing.
#[derive(Debug, Default)]
pub struct MemoryDataSource {
    fixtures: DashMap<Address, Result<WalletData, FetchError>>,
}

impl MemoryDataSource {
    pub fn set(&self, address: &Address, data: WalletData) { self.fixtures.insert(address.clone(), Ok(data)); }

    pub fn set_balance(&self, address: &Address, balance: UD128) {
        self.set(address, WalletData { balance, tokens: Vec::new(), transactions: Vec::new() });
    }

    /// Makes fetches for `address` fail until a fixture is set again.
    pub fn fail(&self, address: &Address) {
        self.fixtures
            .insert(address.clone(), Err(FetchError::Unavailable("mirror node unreachable".to_string())));
    }
}

#[async_trait]
impl WalletDataSource for MemoryDataSource {
    async fn fetch(&self, address: &Address) -> Result<WalletData, FetchError> {
        self.fixtures.get(address).map(|f| f.value().clone()).unwrap_or_else(|| {
            Ok(WalletData { balance: UD128::ZERO, tokens: Vec::new(), transactions: Vec::new() })
        })
    }
}
