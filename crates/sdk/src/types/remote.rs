use serde::{Deserialize, Serialize};

use super::{Address, DisplaySkin, UserId, WalletFamily};

/// Wallet entry as mirrored in the remote session directory.
///
/// The directory is a recovery source and a durable projection of local
/// state, never the authority while local state exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSessionEntry {
    pub user_id: UserId,
    pub address: Address,
    pub wallet_family: WalletFamily,
    pub display_skin: DisplaySkin,
    pub is_default: bool,
    pub is_active: bool,
}
