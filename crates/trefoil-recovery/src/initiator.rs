//! Recovery Initiators
//!
//! Start a Delay & Notify recovery for a lost app or a lost hardware
//! factor. Both generate a fresh app key bundle, checkpoint it locally as a
//! pending attempt, ask the remote to start the delay window and cache the
//! resulting snapshot.
//!
//! The pending checkpoint always replaces any earlier attempt, so at most one
//! attempt exists after an initiation regardless of where it failed.

use crate::store::{RecoveryStore, RecoveryStoreError};
use std::sync::Arc;
use std::time::Duration;
use trefoil_core::effects::{
    AppKeysGenerator, F8eError, F8eRecoveryService, InitiateDelayNotifyRequest, KeyMaterialError,
};
use trefoil_core::{
    FullAccountId, HwFactorProofOfPossession, HwKeyBundle, LocalRecoveryAttemptProgress,
    PhysicalFactor, RecoveryLock, ServerRecovery,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitiateRecoveryError {
    #[error("failed to generate app keys: {0}")]
    FailedToGenerateKeys(#[from] KeyMaterialError),
    #[error("failed to persist recovery state: {0}")]
    FailedToPersistRecoveryState(#[from] RecoveryStoreError),
    #[error("failed to initiate delay and notify: {0}")]
    F8eInitiateDelayNotify(#[from] F8eError),
}

/// Collaborators shared by both initiators.
#[derive(Clone)]
struct Initiation {
    f8e: Arc<dyn F8eRecoveryService>,
    store: Arc<RecoveryStore>,
    recovery_lock: Arc<RecoveryLock>,
    app_keys_generator: Arc<dyn AppKeysGenerator>,
    delay_period: Duration,
}

impl Initiation {
    async fn run(
        &self,
        full_account_id: &FullAccountId,
        lost_factor: PhysicalFactor,
        hw_key_bundle: HwKeyBundle,
        hw_proof_of_possession: Option<HwFactorProofOfPossession>,
    ) -> Result<ServerRecovery, InitiateRecoveryError> {
        let _guard = self.recovery_lock.lock().await;
        tracing::info!(account_id = %full_account_id, ?lost_factor, "initiating recovery");

        let app_key_bundle = self
            .app_keys_generator
            .generate_key_bundle(hw_key_bundle.network)
            .await?;

        let request = InitiateDelayNotifyRequest {
            full_account_id: full_account_id.clone(),
            lost_factor,
            destination_app_global_auth_pub_key: app_key_bundle.auth_key.clone(),
            destination_app_recovery_auth_pub_key: app_key_bundle.recovery_auth_key.clone(),
            destination_hardware_auth_pub_key: hw_key_bundle.auth_key.clone(),
            delay_period: self.delay_period,
            hw_proof_of_possession,
        };

        self.store
            .set_local_progress(LocalRecoveryAttemptProgress::CreatedPendingKeybundles {
                full_account_id: full_account_id.clone(),
                lost_factor,
                app_key_bundle,
                hw_key_bundle,
            })
            .await?;

        let server_recovery = self.f8e.initiate_delay_notify(request).await?;

        self.store
            .set_active_server_recovery(Some(server_recovery.clone()))
            .await?;

        tracing::info!(
            account_id = %full_account_id,
            end_time = %server_recovery.end_time,
            "recovery initiated"
        );
        Ok(server_recovery)
    }
}

/// Starts recovery of a lost app using the customer's existing hardware.
#[derive(Clone)]
pub struct LostAppRecoveryInitiator {
    initiation: Initiation,
}

impl LostAppRecoveryInitiator {
    pub fn new(
        f8e: Arc<dyn F8eRecoveryService>,
        store: Arc<RecoveryStore>,
        recovery_lock: Arc<RecoveryLock>,
        app_keys_generator: Arc<dyn AppKeysGenerator>,
        delay_period: Duration,
    ) -> Self {
        Self {
            initiation: Initiation {
                f8e,
                store,
                recovery_lock,
                app_keys_generator,
                delay_period,
            },
        }
    }

    /// `hw_key_bundle` is the existing hardware's bundle; the proof shows the
    /// customer still holds it.
    pub async fn initiate(
        &self,
        full_account_id: &FullAccountId,
        hw_key_bundle: HwKeyBundle,
        hw_proof_of_possession: HwFactorProofOfPossession,
    ) -> Result<ServerRecovery, InitiateRecoveryError> {
        self.initiation
            .run(
                full_account_id,
                PhysicalFactor::App,
                hw_key_bundle,
                Some(hw_proof_of_possession),
            )
            .await
    }
}

/// Starts recovery of lost hardware using the customer's app and a newly
/// paired replacement device.
#[derive(Clone)]
pub struct LostHardwareRecoveryInitiator {
    initiation: Initiation,
}

impl LostHardwareRecoveryInitiator {
    pub fn new(
        f8e: Arc<dyn F8eRecoveryService>,
        store: Arc<RecoveryStore>,
        recovery_lock: Arc<RecoveryLock>,
        app_keys_generator: Arc<dyn AppKeysGenerator>,
        delay_period: Duration,
    ) -> Self {
        Self {
            initiation: Initiation {
                f8e,
                store,
                recovery_lock,
                app_keys_generator,
                delay_period,
            },
        }
    }

    /// `new_hw_key_bundle` belongs to the replacement hardware.
    pub async fn initiate(
        &self,
        full_account_id: &FullAccountId,
        new_hw_key_bundle: HwKeyBundle,
    ) -> Result<ServerRecovery, InitiateRecoveryError> {
        self.initiation
            .run(full_account_id, PhysicalFactor::Hardware, new_hw_key_bundle, None)
            .await
    }
}
