//! Sweep Generator
//!
//! Builds one unsigned full-balance transaction per superseded keyset that
//! still holds funds and can be co-signed, paying into the account's active
//! keyset.
//!
//! Per keyset the generator decides which two of the three key-holders sign
//! (the [`SignaturePlan`]):
//!
//! | app | hardware | plan |
//! |-----|----------|------|
//! | no  | no       | keyset skipped |
//! | no  | yes      | `HardwareAndServer` |
//! | yes | no       | `AppAndServer` |
//! | yes | yes      | `AppAndHardware` across derivation schemes, else `AppAndServer` |
//!
//! Plans that involve the server get a chaincode-delegation tweak when the
//! destination is a private wallet.
//!
//! Keysets are processed one at a time in keybox order and the output keeps
//! that order. An empty wallet skips its keyset; any other wallet failure
//! aborts the whole sweep.

use bitcoin::psbt::Psbt;
use bitcoin::Address;
use std::sync::Arc;
use trefoil_core::effects::{
    AddressWatchRegistrar, ChaincodeDelegationTweaker, DescriptorBackupVerifier, F8eError,
    F8eRecoveryService, KeyMaterialError, KeyMaterialStore, TweakError, WalletError,
    WalletProvider, WatchAddress,
};
use trefoil_core::{
    F8eKeysetId, FullAccount, PhysicalFactor, SignaturePlan, SpendingKeyset, SweepContext,
    SweepPsbt,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SweepGeneratorError {
    #[error("private wallet destination requires local keysets")]
    PrivateWalletMissingLocalKeysets,
    #[error("failed to list keysets: {0}")]
    FailedToListKeysets(F8eError),
    #[error("failed to generate destination address: {reason}")]
    FailedToGenerateDestinationAddress { reason: String },
    #[error("failed to look up key material: {0}")]
    FailedToCheckKeyMaterial(#[from] KeyMaterialError),
    #[error("failed to open wallet for keyset {keyset_id}: {source}")]
    FailedToOpenWallet {
        keyset_id: F8eKeysetId,
        source: WalletError,
    },
    #[error("failed to sync wallet for keyset {keyset_id}: {source}")]
    BdkFailedToSyncWallet {
        keyset_id: F8eKeysetId,
        source: WalletError,
    },
    #[error("failed to create psbt for keyset {keyset_id}: {source}")]
    BdkFailedToCreatePsbt {
        keyset_id: F8eKeysetId,
        source: WalletError,
    },
    #[error("failed to tweak psbt for keyset {keyset_id}: {source}")]
    FailedToTweakPsbt {
        keyset_id: F8eKeysetId,
        source: TweakError,
    },
}

impl SweepGeneratorError {
    fn destination(reason: impl Into<String>) -> Self {
        Self::FailedToGenerateDestinationAddress {
            reason: reason.into(),
        }
    }
}

/// Which signing factors can still sign for a keyset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FactorAvailability {
    app: bool,
    hardware: bool,
}

/// Choose the co-signers for sweeping `source` into `destination`.
///
/// Returns `None` when neither the app nor the hardware can sign.
pub fn select_signature_plan(
    app_available: bool,
    hardware_available: bool,
    source: &SpendingKeyset,
    destination: &SpendingKeyset,
) -> Option<SignaturePlan> {
    match (app_available, hardware_available) {
        (false, false) => None,
        (false, true) => Some(SignaturePlan::HardwareAndServer),
        (true, false) => Some(SignaturePlan::AppAndServer),
        (true, true) if source.is_private_wallet() != destination.is_private_wallet() => {
            Some(SignaturePlan::AppAndHardware)
        }
        (true, true) => Some(SignaturePlan::AppAndServer),
    }
}

pub struct SweepGenerator {
    f8e: Arc<dyn F8eRecoveryService>,
    address_watch: Arc<dyn AddressWatchRegistrar>,
    key_material: Arc<dyn KeyMaterialStore>,
    wallets: Arc<dyn WalletProvider>,
    tweaker: Arc<dyn ChaincodeDelegationTweaker>,
    descriptor_backups: Arc<dyn DescriptorBackupVerifier>,
}

impl SweepGenerator {
    pub fn new(
        f8e: Arc<dyn F8eRecoveryService>,
        address_watch: Arc<dyn AddressWatchRegistrar>,
        key_material: Arc<dyn KeyMaterialStore>,
        wallets: Arc<dyn WalletProvider>,
        tweaker: Arc<dyn ChaincodeDelegationTweaker>,
        descriptor_backups: Arc<dyn DescriptorBackupVerifier>,
    ) -> Self {
        Self {
            f8e,
            address_watch,
            key_material,
            wallets,
            tweaker,
            descriptor_backups,
        }
    }

    /// Generate the sweep transactions for `account`.
    ///
    /// [`SweepContext::Estimate`] still syncs wallets but registers no
    /// watch addresses and reveals no new receive address.
    pub async fn generate_sweep(
        &self,
        account: &FullAccount,
        context: SweepContext,
    ) -> Result<Vec<SweepPsbt>, SweepGeneratorError> {
        let keybox = &account.keybox;
        let destination = &keybox.active_spending_keyset;
        if destination.is_private_wallet() && !keybox.can_use_keybox_keysets {
            return Err(SweepGeneratorError::PrivateWalletMissingLocalKeysets);
        }

        let sources: Vec<SpendingKeyset> = if keybox.can_use_keybox_keysets {
            keybox.inactive_keysets().cloned().collect()
        } else {
            self.f8e
                .list_keysets(&account.account_id)
                .await
                .map_err(SweepGeneratorError::FailedToListKeysets)?
                .into_iter()
                .filter(|keyset| !keyset.is_same_keyset(destination))
                .collect()
        };

        let destination_address = self.destination_address(destination, context).await?;

        let mut sweep_psbts = Vec::new();
        for source in &sources {
            let availability = self.factor_availability(source, context.lost_factor()).await?;
            let Some(plan) = select_signature_plan(
                availability.app,
                availability.hardware,
                source,
                destination,
            ) else {
                tracing::debug!(
                    keyset_id = %source.keyset_id(),
                    "no local signing factor for keyset, skipping"
                );
                continue;
            };

            if let Some(sweep_psbt) = self
                .sweep_keyset(source, destination, &destination_address, plan)
                .await?
            {
                sweep_psbts.push(sweep_psbt);
            }
        }

        if !context.is_dry_run() && !sweep_psbts.is_empty() {
            self.register_watch_addresses(account, destination, &sweep_psbts)
                .await;
        }

        tracing::info!(
            account_id = %account.account_id,
            ?context,
            psbts = sweep_psbts.len(),
            "generated sweep"
        );
        Ok(sweep_psbts)
    }

    /// Private wallets and dry runs peek at index zero instead of revealing a
    /// fresh address.
    async fn destination_address(
        &self,
        destination: &SpendingKeyset,
        context: SweepContext,
    ) -> Result<Address, SweepGeneratorError> {
        if destination.is_private_wallet()
            && !self
                .descriptor_backups
                .is_verified(destination.keyset_id())
                .await
        {
            return Err(SweepGeneratorError::destination(
                "descriptor backup for private wallet is not verified",
            ));
        }

        let wallet = self
            .wallets
            .spending_wallet(destination)
            .await
            .map_err(|err| SweepGeneratorError::destination(err.to_string()))?;

        let address = if destination.is_private_wallet() || context.is_dry_run() {
            wallet.peek_address(0).await
        } else {
            wallet.new_address().await
        };
        address.map_err(|err| SweepGeneratorError::destination(err.to_string()))
    }

    async fn factor_availability(
        &self,
        source: &SpendingKeyset,
        lost_factor: Option<PhysicalFactor>,
    ) -> Result<FactorAvailability, SweepGeneratorError> {
        let app = lost_factor != Some(PhysicalFactor::App)
            && self
                .key_material
                .has_app_spending_private_key(&source.app_key)
                .await?;

        let hardware = lost_factor != Some(PhysicalFactor::Hardware)
            && match source.hardware_key.0.origin_fingerprint() {
                Some(fingerprint) => self.is_known_hardware(fingerprint).await,
                None => false,
            };

        Ok(FactorAvailability { app, hardware })
    }

    async fn is_known_hardware(&self, fingerprint: &str) -> bool {
        let paired = self.key_material.paired_hardware_fingerprint().await;
        if paired.as_deref() == Some(fingerprint) {
            return true;
        }
        self.key_material
            .known_hardware_fingerprints()
            .await
            .iter()
            .any(|known| known == fingerprint)
    }

    /// Build the sweep for one keyset; `None` when it holds nothing to sweep.
    async fn sweep_keyset(
        &self,
        source: &SpendingKeyset,
        destination: &SpendingKeyset,
        destination_address: &Address,
        plan: SignaturePlan,
    ) -> Result<Option<SweepPsbt>, SweepGeneratorError> {
        let keyset_id = source.keyset_id().clone();
        let wallet = self.wallets.spending_wallet(source).await.map_err(|err| {
            SweepGeneratorError::FailedToOpenWallet {
                keyset_id: keyset_id.clone(),
                source: err,
            }
        })?;

        wallet
            .sync()
            .await
            .map_err(|err| SweepGeneratorError::BdkFailedToSyncWallet {
                keyset_id: keyset_id.clone(),
                source: err,
            })?;

        let unsigned = match wallet.create_signedless_sweep(destination_address).await {
            Ok(unsigned) => unsigned,
            Err(WalletError::InsufficientFunds) => {
                tracing::warn!(keyset_id = %keyset_id, "insufficient funds to sweep keyset, skipping");
                return Ok(None);
            }
            Err(err) => {
                return Err(SweepGeneratorError::BdkFailedToCreatePsbt {
                    keyset_id,
                    source: err,
                });
            }
        };

        let psbt = self
            .tweak(source, destination, plan, unsigned.psbt)
            .await
            .map_err(|err| SweepGeneratorError::FailedToTweakPsbt {
                keyset_id: keyset_id.clone(),
                source: err,
            })?;

        tracing::debug!(keyset_id = %keyset_id, ?plan, fee = %unsigned.fee, "built sweep psbt");
        Ok(Some(SweepPsbt {
            psbt,
            fee: unsigned.fee,
            signature_plan: plan,
            source_keyset: source.clone(),
            destination_address: destination_address.clone(),
        }))
    }

    async fn tweak(
        &self,
        source: &SpendingKeyset,
        destination: &SpendingKeyset,
        plan: SignaturePlan,
        psbt: Psbt,
    ) -> Result<Psbt, TweakError> {
        if !plan.requires_server() || !destination.is_private_wallet() {
            return Ok(psbt);
        }
        if source.is_private_wallet() {
            self.tweaker.sweep_tweak(source, destination, psbt).await
        } else {
            self.tweaker.migration_tweak(source, destination, psbt).await
        }
    }

    async fn register_watch_addresses(
        &self,
        account: &FullAccount,
        destination: &SpendingKeyset,
        sweep_psbts: &[SweepPsbt],
    ) {
        let mut addresses: Vec<WatchAddress> = Vec::new();
        for sweep in sweep_psbts {
            if addresses
                .iter()
                .all(|watched| watched.address != sweep.destination_address)
            {
                addresses.push(WatchAddress {
                    address: sweep.destination_address.clone(),
                    keyset_id: destination.keyset_id().clone(),
                });
            }
        }

        if let Err(err) = self
            .address_watch
            .register_watch_addresses(&account.account_id, addresses)
            .await
        {
            tracing::warn!(
                account_id = %account.account_id,
                error = %err,
                "failed to register sweep destination addresses"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trefoil_testkit::fixtures::spending_keyset;

    #[test]
    fn plan_follows_available_factors() {
        let legacy = spending_keyset(1, false);
        let private = spending_keyset(2, true);
        let other_legacy = spending_keyset(3, false);

        assert_eq!(select_signature_plan(false, false, &legacy, &private), None);
        assert_eq!(
            select_signature_plan(false, true, &legacy, &private),
            Some(SignaturePlan::HardwareAndServer)
        );
        assert_eq!(
            select_signature_plan(true, false, &legacy, &private),
            Some(SignaturePlan::AppAndServer)
        );
        assert_eq!(
            select_signature_plan(true, true, &legacy, &private),
            Some(SignaturePlan::AppAndHardware)
        );
        assert_eq!(
            select_signature_plan(true, true, &legacy, &other_legacy),
            Some(SignaturePlan::AppAndServer)
        );
    }
}
