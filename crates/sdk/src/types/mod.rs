mod family;
mod outcome;
mod remote;

use std::{fmt::Display, str::FromStr};

pub use family::{DisplaySkin, WalletFamily};
pub use outcome::{ConnectOutcome, PairingFailure};
pub use remote::RemoteSessionEntry;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Chain account identifier.
///
/// Opaque to the session core: the format is owned by the chain
/// (`0.0.1234` style account IDs on the default network). Only
/// equality matters, so the value is kept as given, minus surrounding
/// whitespace.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

impl FromStr for Address {
    type Err = crate::error::SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(crate::error::SessionError::InvalidArgument(
                "empty wallet address".to_string(),
            ));
        }
        Ok(Address(s.to_string()))
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self { Address(value.trim().to_string()) }
}

/// Stable identifier of a [`crate::state::WalletRecord`].
///
/// Derived from `(family, address)` so that reconnecting the same wallet
/// yields the same ID across sessions and devices.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(String);

impl WalletId {
    pub fn derive(family: WalletFamily, address: &Address) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(family.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(address.as_str().as_bytes());
        WalletId(hex::encode(&hasher.finalize()[..16]))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl Display for WalletId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            // Short form for tables
            f.write_str(&self.0[..self.0.len().min(8)])
        } else {
            f.write_str(&self.0)
        }
    }
}

impl FromStr for WalletId {
    type Err = crate::error::SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(crate::error::SessionError::InvalidArgument(format!(
                "invalid wallet ID: {}",
                s
            )));
        }
        Ok(WalletId(s.to_ascii_lowercase()))
    }
}

/// Identity of a platform user in the remote session directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self { UserId(id.into()) }

    /// Identity minted for a user first seen through `address`.
    pub fn derive_from(address: &Address) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"user\0");
        hasher.update(address.as_str().as_bytes());
        UserId(format!("u-{}", hex::encode(&hasher.finalize()[..12])))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

impl FromStr for UserId {
    type Err = crate::error::SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(crate::error::SessionError::InvalidArgument("empty user ID".to_string()));
        }
        Ok(UserId(s.trim().to_string()))
    }
}
