use std::fmt::Display;

use super::{Address, WalletId};
use crate::state::WalletRecord;

/// Resolution of a `connect` or `reconnect` intent.
///
/// Expected failure modes are values here rather than errors, so that
/// the caller can always describe what happened to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Wallet paired and recorded (new record or reactivated one).
    Connected(WalletRecord),
    /// Address is already live in the session; nothing changed.
    AlreadyConnected(WalletId),
    /// User dismissed the extension's pairing prompt.
    Cancelled,
    /// A newer connect intent took over the pending slot before this one
    /// resolved; its result, if any, was ignored.
    Superseded,
    /// Pairing did not produce a usable wallet.
    Failed(PairingFailure),
}

impl ConnectOutcome {
    pub fn is_connected(&self) -> bool { matches!(self, ConnectOutcome::Connected(_)) }

    /// Failures the user may simply try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConnectOutcome::Failed(PairingFailure::Timeout | PairingFailure::Rejected(_))
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PairingFailure {
    /// Adapter did not answer within the pairing ceiling.
    Timeout,
    /// Reconnection paired a different account than the one requested.
    AddressMismatch { expected: Address, actual: Address },
    /// Adapter reported success without any account.
    NoAddress,
    /// Adapter or extension rejected the request.
    Rejected(String),
}

impl Display for PairingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairingFailure::Timeout => write!(f, "wallet did not respond in time"),
            PairingFailure::AddressMismatch { expected, actual } => {
                write!(f, "wallet paired {} instead of {}", actual, expected)
            },
            PairingFailure::NoAddress => write!(f, "wallet returned no account"),
            PairingFailure::Rejected(reason) => write!(f, "pairing rejected: {}", reason),
        }
    }
}

impl Display for ConnectOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectOutcome::Connected(record) => {
                write!(f, "connected {} ({})", record.address(), record.family())
            },
            ConnectOutcome::AlreadyConnected(id) => write!(f, "already connected ({:#})", id),
            ConnectOutcome::Cancelled => write!(f, "cancelled"),
            ConnectOutcome::Superseded => write!(f, "superseded by a newer connect request"),
            ConnectOutcome::Failed(failure) => write!(f, "failed: {}", failure),
        }
    }
}
