//! Keysets, keyboxes and accounts.

use crate::identifiers::{F8eKeysetId, FullAccountId, LocalId};
use crate::keys::{
    AppKeyBundle, AppSpendingPublicKey, F8eSpendingPublicKey, HwKeyBundle, HwSpendingPublicKey,
};
use bitcoin::Network;
use serde::{Deserialize, Serialize};

/// The server's half of a keyset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct F8eSpendingKeyset {
    pub keyset_id: F8eKeysetId,
    pub spending_public_key: F8eSpendingPublicKey,
    /// Present when the keyset uses the private-wallet derivation scheme.
    pub private_wallet_root_xpub: Option<String>,
}

impl F8eSpendingKeyset {
    /// Whether this keyset uses the private-wallet derivation scheme.
    pub fn is_private_wallet(&self) -> bool {
        self.private_wallet_root_xpub.is_some()
    }
}

/// One wallet generation: three spending keys plus identifiers.
///
/// Immutable once created. A keyset is identified across devices by its
/// server keyset id; the local id only names the local row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingKeyset {
    pub local_id: LocalId,
    pub f8e_spending_keyset: F8eSpendingKeyset,
    pub network: Network,
    pub app_key: AppSpendingPublicKey,
    pub hardware_key: HwSpendingPublicKey,
}

impl SpendingKeyset {
    /// Server keyset id.
    pub fn keyset_id(&self) -> &F8eKeysetId {
        &self.f8e_spending_keyset.keyset_id
    }

    /// Whether this keyset uses the private-wallet derivation scheme.
    pub fn is_private_wallet(&self) -> bool {
        self.f8e_spending_keyset.is_private_wallet()
    }

    /// Whether two keysets denote the same wallet generation.
    pub fn is_same_keyset(&self, other: &SpendingKeyset) -> bool {
        self.keyset_id() == other.keyset_id()
    }
}

/// An account's key material: every known keyset and the active one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keybox {
    pub local_id: LocalId,
    pub full_account_id: FullAccountId,
    pub active_spending_keyset: SpendingKeyset,
    /// All keysets the account has owned, oldest first. May include the
    /// active keyset.
    pub keysets: Vec<SpendingKeyset>,
    pub active_app_key_bundle: AppKeyBundle,
    pub active_hw_key_bundle: HwKeyBundle,
    /// Whether `keysets` is trusted as complete. When false the
    /// authoritative list must be fetched from the remote.
    pub can_use_keybox_keysets: bool,
    pub network: Network,
}

impl Keybox {
    /// Keysets other than the active one, in stored order.
    pub fn inactive_keysets(&self) -> impl Iterator<Item = &SpendingKeyset> {
        self.keysets
            .iter()
            .filter(move |keyset| !keyset.is_same_keyset(&self.active_spending_keyset))
    }
}

/// A full (three-factor) account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullAccount {
    pub account_id: FullAccountId,
    pub keybox: Keybox,
}

impl FullAccount {
    /// Create an account from its keybox.
    pub fn new(keybox: Keybox) -> Self {
        Self {
            account_id: keybox.full_account_id.clone(),
            keybox,
        }
    }
}
