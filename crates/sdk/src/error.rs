//! Error types of the session core and its collaborators.
//!
//! Collaborator errors ([`AdapterError`], [`DirectoryError`],
//! [`StoreError`], [`FetchError`]) never leave the reconciler: they are
//! either translated into [`crate::types::ConnectOutcome`] values or
//! logged. [`SessionError`] is reserved for caller mistakes.

use thiserror::Error;

use crate::types::{WalletFamily, WalletId};

/// Misuse of the intent surface.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("unknown wallet: {0}")]
    UnknownWallet(WalletId),

    #[error("no wallet adapter registered for {0}")]
    UnknownFamily(WalletFamily),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Failure reported by a wallet extension adapter.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("wallet extension is not available: {0}")]
    Unavailable(String),

    #[error("wallet extension rejected the request: {0}")]
    Rejected(String),

    #[error("wallet extension request timed out")]
    Timeout,
}

/// Failure of the remote session directory.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("session directory unavailable: {0}")]
    Unavailable(String),

    #[error("session directory request timed out")]
    Timeout,

    #[error("session directory rejected the request: {0}")]
    Rejected(String),
}

/// Failure of the local session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("session store serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("session store quota exceeded")]
    QuotaExceeded,
}

/// Failure fetching per-wallet data.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("wallet data source unavailable: {0}")]
    Unavailable(String),

    #[error("wallet data request timed out")]
    Timeout,
}
