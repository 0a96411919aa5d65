//! Recovery Canceler

use crate::store::{RecoveryStore, RecoveryStoreError};
use std::sync::Arc;
use trefoil_core::effects::{F8eClientErrorCode, F8eError, F8eRecoveryService};
use trefoil_core::{FullAccountId, HwFactorProofOfPossession, RecoveryLock};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CancelRecoveryError {
    #[error("failed to cancel delay and notify: {0}")]
    F8eCancelDelayNotify(#[from] F8eError),
    #[error("failed to clear recovery state: {0}")]
    FailedToClearRecoveryState(#[from] RecoveryStoreError),
}

/// Cancels the account's Delay & Notify recovery and forgets it locally.
#[derive(Clone)]
pub struct RecoveryCanceler {
    f8e: Arc<dyn F8eRecoveryService>,
    store: Arc<RecoveryStore>,
    recovery_lock: Arc<RecoveryLock>,
}

impl RecoveryCanceler {
    pub fn new(
        f8e: Arc<dyn F8eRecoveryService>,
        store: Arc<RecoveryStore>,
        recovery_lock: Arc<RecoveryLock>,
    ) -> Self {
        Self {
            f8e,
            store,
            recovery_lock,
        }
    }

    /// A recovery the remote no longer knows about counts as canceled.
    pub async fn cancel(
        &self,
        full_account_id: &FullAccountId,
        hw_proof_of_possession: Option<HwFactorProofOfPossession>,
    ) -> Result<(), CancelRecoveryError> {
        let _guard = self.recovery_lock.lock().await;

        match self
            .f8e
            .cancel_delay_notify(full_account_id, hw_proof_of_possession)
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_client_error(&F8eClientErrorCode::NoRecoveryExists) => {
                tracing::info!(account_id = %full_account_id, "recovery already canceled remotely");
            }
            Err(err) => return Err(err.into()),
        }

        self.store.clear().await?;
        tracing::info!(account_id = %full_account_id, "recovery canceled");
        Ok(())
    }
}
