//! Wallet view, tweak and descriptor-backup effects.

use crate::identifiers::F8eKeysetId;
use crate::keyset::SpendingKeyset;
use async_trait::async_trait;
use bitcoin::psbt::Psbt;
use bitcoin::{Address, Amount};
use std::sync::Arc;

/// Wallet operation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// The wallet cannot cover the outputs plus fee.
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("wallet sync failed: {message}")]
    Sync { message: String },
    #[error("address generation failed: {message}")]
    Address { message: String },
    #[error("transaction construction failed: {message}")]
    Transaction { message: String },
}

/// A transaction ready for co-signing, plus its miner fee.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    pub psbt: Psbt,
    pub fee: Amount,
}

/// A synced view of one keyset's wallet.
#[async_trait]
pub trait SpendingWallet: Send + Sync {
    async fn sync(&self) -> Result<(), WalletError>;

    /// Next unused receive address.
    async fn new_address(&self) -> Result<Address, WalletError>;

    /// Receive address at `index`, without marking it used.
    async fn peek_address(&self, index: u32) -> Result<Address, WalletError>;

    /// Unsigned transaction sending the full balance to `destination`.
    async fn create_signedless_sweep(
        &self,
        destination: &Address,
    ) -> Result<UnsignedTransaction, WalletError>;
}

/// Opens wallet views per keyset.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn spending_wallet(
        &self,
        keyset: &SpendingKeyset,
    ) -> Result<Arc<dyn SpendingWallet>, WalletError>;
}

/// Chaincode-delegation tweak failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("psbt tweak failed: {message}")]
pub struct TweakError {
    pub message: String,
}

impl TweakError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Applies the private-wallet tweaks a sweep needs before signing.
#[async_trait]
pub trait ChaincodeDelegationTweaker: Send + Sync {
    /// Private source to private destination.
    async fn sweep_tweak(
        &self,
        source: &SpendingKeyset,
        destination: &SpendingKeyset,
        psbt: Psbt,
    ) -> Result<Psbt, TweakError>;

    /// Legacy source to private destination.
    async fn migration_tweak(
        &self,
        source: &SpendingKeyset,
        destination: &SpendingKeyset,
        psbt: Psbt,
    ) -> Result<Psbt, TweakError>;
}

/// Knows whether a keyset's descriptor has a verified backup.
#[async_trait]
pub trait DescriptorBackupVerifier: Send + Sync {
    async fn is_verified(&self, keyset_id: &F8eKeysetId) -> bool;
}
