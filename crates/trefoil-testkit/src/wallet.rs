//! Fake wallet views, tweak service and descriptor-backup verifier.

use async_trait::async_trait;
use bitcoin::psbt::Psbt;
use bitcoin::Address;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use trefoil_core::effects::{
    ChaincodeDelegationTweaker, DescriptorBackupVerifier, SpendingWallet, TweakError,
    UnsignedTransaction, WalletError, WalletProvider,
};
use trefoil_core::{F8eKeysetId, SpendingKeyset};

use crate::fixtures::{address, unsigned_transaction};

#[derive(Debug)]
struct WalletState {
    receive_address: Address,
    sweep: Result<UnsignedTransaction, WalletError>,
    sync_error: Option<WalletError>,
    address_error: Option<WalletError>,
    sync_calls: usize,
    new_address_calls: usize,
    peeked_indices: Vec<u32>,
    sweep_destinations: Vec<Address>,
}

/// One keyset's wallet. Starts empty: sweeps fail with insufficient funds
/// until [`fund`](Self::fund) is called.
#[derive(Debug)]
pub struct FakeSpendingWallet {
    state: Mutex<WalletState>,
}

impl FakeSpendingWallet {
    pub fn new(receive_address: Address) -> Self {
        Self {
            state: Mutex::new(WalletState {
                receive_address,
                sweep: Err(WalletError::InsufficientFunds),
                sync_error: None,
                address_error: None,
                sync_calls: 0,
                new_address_calls: 0,
                peeked_indices: Vec::new(),
                sweep_destinations: Vec::new(),
            }),
        }
    }

    /// Hold `amount` sats; a sweep pays `amount - fee` to the destination.
    pub fn fund(&self, amount: u64, fee: u64) {
        self.state.lock().sweep = Ok(unsigned_transaction(
            &address(u8::MAX),
            amount.saturating_sub(fee),
            fee,
        ));
    }

    pub fn fail_sweep_with(&self, error: WalletError) {
        self.state.lock().sweep = Err(error);
    }

    pub fn fail_sync_with(&self, error: Option<WalletError>) {
        self.state.lock().sync_error = error;
    }

    pub fn fail_address_with(&self, error: Option<WalletError>) {
        self.state.lock().address_error = error;
    }

    pub fn receive_address(&self) -> Address {
        self.state.lock().receive_address.clone()
    }

    pub fn sync_calls(&self) -> usize {
        self.state.lock().sync_calls
    }

    pub fn new_address_calls(&self) -> usize {
        self.state.lock().new_address_calls
    }

    pub fn peeked_indices(&self) -> Vec<u32> {
        self.state.lock().peeked_indices.clone()
    }

    pub fn sweep_destinations(&self) -> Vec<Address> {
        self.state.lock().sweep_destinations.clone()
    }
}

#[async_trait]
impl SpendingWallet for FakeSpendingWallet {
    async fn sync(&self) -> Result<(), WalletError> {
        let mut state = self.state.lock();
        state.sync_calls += 1;
        match state.sync_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn new_address(&self) -> Result<Address, WalletError> {
        let mut state = self.state.lock();
        state.new_address_calls += 1;
        match state.address_error.clone() {
            Some(err) => Err(err),
            None => Ok(state.receive_address.clone()),
        }
    }

    async fn peek_address(&self, index: u32) -> Result<Address, WalletError> {
        let mut state = self.state.lock();
        state.peeked_indices.push(index);
        match state.address_error.clone() {
            Some(err) => Err(err),
            None => Ok(state.receive_address.clone()),
        }
    }

    async fn create_signedless_sweep(
        &self,
        destination: &Address,
    ) -> Result<UnsignedTransaction, WalletError> {
        let mut state = self.state.lock();
        state.sweep_destinations.push(destination.clone());
        let mut sweep = state.sweep.clone()?;
        // Pay to the requested destination.
        for output in &mut sweep.psbt.unsigned_tx.output {
            output.script_pubkey = destination.script_pubkey();
        }
        Ok(sweep)
    }
}

/// Opens one [`FakeSpendingWallet`] per keyset id, creating it on first use.
#[derive(Debug, Default)]
pub struct FakeWalletProvider {
    wallets: Mutex<HashMap<F8eKeysetId, Arc<FakeSpendingWallet>>>,
    opened: Mutex<Vec<F8eKeysetId>>,
}

impl FakeWalletProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wallet for `keyset`, so tests can fund or break it.
    pub fn wallet(&self, keyset: &SpendingKeyset) -> Arc<FakeSpendingWallet> {
        let mut wallets = self.wallets.lock();
        let next = u8::try_from(wallets.len()).unwrap_or(u8::MAX - 1);
        wallets
            .entry(keyset.keyset_id().clone())
            .or_insert_with(|| Arc::new(FakeSpendingWallet::new(address(next))))
            .clone()
    }

    /// Keyset ids in the order their wallets were opened.
    pub fn opened(&self) -> Vec<F8eKeysetId> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl WalletProvider for FakeWalletProvider {
    async fn spending_wallet(
        &self,
        keyset: &SpendingKeyset,
    ) -> Result<Arc<dyn SpendingWallet>, WalletError> {
        self.opened.lock().push(keyset.keyset_id().clone());
        let wallet: Arc<dyn SpendingWallet> = self.wallet(keyset);
        Ok(wallet)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweakKind {
    Sweep,
    Migration,
}

/// Records tweak calls and returns the psbt unchanged.
#[derive(Debug, Default)]
pub struct FakeChaincodeDelegationTweaker {
    calls: Mutex<Vec<(TweakKind, F8eKeysetId, F8eKeysetId)>>,
    error: Mutex<Option<TweakError>>,
}

impl FakeChaincodeDelegationTweaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: Option<TweakError>) {
        *self.error.lock() = error;
    }

    /// `(kind, source keyset, destination keyset)` per call.
    pub fn calls(&self) -> Vec<(TweakKind, F8eKeysetId, F8eKeysetId)> {
        self.calls.lock().clone()
    }

    fn tweak(
        &self,
        kind: TweakKind,
        source: &SpendingKeyset,
        destination: &SpendingKeyset,
        psbt: Psbt,
    ) -> Result<Psbt, TweakError> {
        self.calls.lock().push((
            kind,
            source.keyset_id().clone(),
            destination.keyset_id().clone(),
        ));
        match self.error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(psbt),
        }
    }
}

#[async_trait]
impl ChaincodeDelegationTweaker for FakeChaincodeDelegationTweaker {
    async fn sweep_tweak(
        &self,
        source: &SpendingKeyset,
        destination: &SpendingKeyset,
        psbt: Psbt,
    ) -> Result<Psbt, TweakError> {
        self.tweak(TweakKind::Sweep, source, destination, psbt)
    }

    async fn migration_tweak(
        &self,
        source: &SpendingKeyset,
        destination: &SpendingKeyset,
        psbt: Psbt,
    ) -> Result<Psbt, TweakError> {
        self.tweak(TweakKind::Migration, source, destination, psbt)
    }
}

#[derive(Debug, Default)]
pub struct FakeDescriptorBackupVerifier {
    verified: Mutex<HashSet<F8eKeysetId>>,
}

impl FakeDescriptorBackupVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_verified(&self, keyset_id: F8eKeysetId) {
        self.verified.lock().insert(keyset_id);
    }
}

#[async_trait]
impl DescriptorBackupVerifier for FakeDescriptorBackupVerifier {
    async fn is_verified(&self, keyset_id: &F8eKeysetId) -> bool {
        self.verified.lock().contains(keyset_id)
    }
}
