//! Recovery Completer
//!
//! Completes a Delay & Notify recovery once its window has elapsed and
//! rotates the account onto the destination auth keys.
//!
//! Order of operations:
//!
//! 1. Check the hardware signed the completion challenge and that the keys
//!    belong to the persisted attempt
//! 2. Checkpoint `AttemptingCompletion` with the sealed CSEK
//! 3. Sign the challenge with the new app global auth key
//! 4. Ask the remote to complete
//! 5. Authenticate for recovery scope, then global scope, storing both
//! 6. Optionally drop protected-customer relationships
//! 7. Checkpoint `RotatedAuthKeys`
//!
//! A failure stops the sequence and the store stays at the last checkpoint.
//! The checkpoint in step 2 is written before the remote call so a crash in
//! flight resumes as `MaybeNoLongerRecovering`.

use crate::store::{RecoveryStore, RecoveryStoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use trefoil_core::effects::{
    AppAuthKeySigner, AuthTokenScope, AuthTokenService, AuthTokensStore, AuthTokensStoreError,
    CompleteDelayNotifyRequest, F8eClientErrorCode, F8eError, F8eRecoveryService,
    KeyMaterialError, RelationshipsService, SignatureVerifier,
};
use trefoil_core::{
    AppKeyBundle, FullAccountId, HwKeyBundle, LocalRecoveryAttemptProgress, RecoveryLock,
    SealedCsek, Signature,
};

const CHALLENGE_PREFIX: &str = "CompleteDelayNotify";

/// The message both destination factors sign to complete a recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionChallenge {
    bytes: Vec<u8>,
}

impl CompletionChallenge {
    pub fn new(app_key_bundle: &AppKeyBundle, hw_key_bundle: &HwKeyBundle) -> Self {
        let message = format!(
            "{CHALLENGE_PREFIX}{}{}{}",
            hw_key_bundle.auth_key, app_key_bundle.auth_key, app_key_bundle.recovery_auth_key
        );
        Self {
            bytes: message.into_bytes(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Inputs for [`RecoveryAuthCompleter::rotate_auth_keys`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotateAuthKeysRequest {
    pub full_account_id: FullAccountId,
    pub app_key_bundle: AppKeyBundle,
    pub hw_key_bundle: HwKeyBundle,
    /// Hardware signature over the [`CompletionChallenge`].
    pub hardware_signature: Signature,
    pub sealed_csek: SealedCsek,
    pub remove_protected_customers: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RotateAuthKeysError {
    #[error("challenge was not signed by the destination hardware")]
    InvalidHardwareSignature,
    #[error("no local recovery attempt for these destination keys")]
    NoMatchingRecoveryAttempt,
    #[error("failed to persist recovery state: {0}")]
    FailedToPersistRecoveryState(#[from] RecoveryStoreError),
    #[error("failed to sign completion challenge: {0}")]
    FailedToSignChallenge(#[from] KeyMaterialError),
    #[error("recovery was canceled by the server")]
    RecoveryCanceledByServer,
    #[error("failed to complete delay and notify: {0}")]
    F8eCompleteDelayNotify(F8eError),
    #[error("failed to authenticate with {scope:?} scope: {source}")]
    FailedToAuthenticate {
        scope: AuthTokenScope,
        source: F8eError,
    },
    #[error("failed to store auth tokens: {0}")]
    FailedToStoreAuthTokens(#[from] AuthTokensStoreError),
    #[error("failed to remove protected customer relationships: {0}")]
    FailedToRemoveRelationships(F8eError),
}

pub struct RecoveryAuthCompleter {
    f8e: Arc<dyn F8eRecoveryService>,
    store: Arc<RecoveryStore>,
    recovery_lock: Arc<RecoveryLock>,
    signer: Arc<dyn AppAuthKeySigner>,
    verifier: Arc<dyn SignatureVerifier>,
    auth: Arc<dyn AuthTokenService>,
    auth_tokens: Arc<dyn AuthTokensStore>,
    relationships: Arc<dyn RelationshipsService>,
    min_duration: Duration,
}

impl RecoveryAuthCompleter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        f8e: Arc<dyn F8eRecoveryService>,
        store: Arc<RecoveryStore>,
        recovery_lock: Arc<RecoveryLock>,
        signer: Arc<dyn AppAuthKeySigner>,
        verifier: Arc<dyn SignatureVerifier>,
        auth: Arc<dyn AuthTokenService>,
        auth_tokens: Arc<dyn AuthTokensStore>,
        relationships: Arc<dyn RelationshipsService>,
        min_duration: Duration,
    ) -> Self {
        Self {
            f8e,
            store,
            recovery_lock,
            signer,
            verifier,
            auth,
            auth_tokens,
            relationships,
            min_duration,
        }
    }

    /// Complete the recovery and rotate auth keys.
    ///
    /// Takes at least the configured minimum duration unless the hardware
    /// signature is rejected up front.
    pub async fn rotate_auth_keys(
        &self,
        request: RotateAuthKeysRequest,
    ) -> Result<(), RotateAuthKeysError> {
        let challenge = CompletionChallenge::new(&request.app_key_bundle, &request.hw_key_bundle);
        if !self.verifier.verify(
            challenge.as_bytes(),
            &request.hardware_signature,
            request.hw_key_bundle.auth_key.as_str(),
        ) {
            return Err(RotateAuthKeysError::InvalidHardwareSignature);
        }

        let deadline = Instant::now() + self.min_duration;
        let result = self.complete(request, challenge).await;
        tokio::time::sleep_until(deadline).await;
        result
    }

    async fn complete(
        &self,
        request: RotateAuthKeysRequest,
        challenge: CompletionChallenge,
    ) -> Result<(), RotateAuthKeysError> {
        let _guard = self.recovery_lock.lock().await;
        let account_id = &request.full_account_id;

        let records = self.store.records().await?;
        let matches_attempt = records.local_attempt.as_ref().is_some_and(|attempt| {
            attempt.full_account_id == *account_id
                && attempt.app_key_bundle == request.app_key_bundle
                && attempt.hw_key_bundle == request.hw_key_bundle
        });
        if !matches_attempt {
            tracing::warn!(account_id = %account_id, "completion keys do not match local attempt");
            return Err(RotateAuthKeysError::NoMatchingRecoveryAttempt);
        }

        self.store
            .set_local_progress(LocalRecoveryAttemptProgress::AttemptingCompletion {
                sealed_csek: request.sealed_csek.clone(),
            })
            .await?;

        let app_signature = self
            .signer
            .sign_with_global_auth_key(&request.app_key_bundle.auth_key, challenge.as_bytes())
            .await?;

        let completion = self
            .f8e
            .complete_delay_notify(
                account_id,
                CompleteDelayNotifyRequest {
                    challenge: challenge.as_bytes().to_vec(),
                    app_signature,
                    hardware_signature: request.hardware_signature.clone(),
                },
            )
            .await;
        match completion {
            Ok(()) => {}
            Err(err) if err.is_client_error(&F8eClientErrorCode::NoRecoveryExists) => {
                tracing::warn!(account_id = %account_id, "recovery canceled before completion");
                self.store
                    .set_local_progress(
                        LocalRecoveryAttemptProgress::CompletionAttemptFailedDueToServerCancellation,
                    )
                    .await?;
                return Err(RotateAuthKeysError::RecoveryCanceledByServer);
            }
            Err(err) => return Err(RotateAuthKeysError::F8eCompleteDelayNotify(err)),
        }
        tracing::info!(account_id = %account_id, "delay and notify completed");

        self.authenticate(
            account_id,
            request.app_key_bundle.recovery_auth_key.as_str(),
            AuthTokenScope::Recovery,
        )
        .await?;
        self.authenticate(
            account_id,
            request.app_key_bundle.auth_key.as_str(),
            AuthTokenScope::Global,
        )
        .await?;

        if request.remove_protected_customers {
            self.relationships
                .remove_protected_customer_relationships(account_id)
                .await
                .map_err(RotateAuthKeysError::FailedToRemoveRelationships)?;
        }

        self.store
            .set_local_progress(LocalRecoveryAttemptProgress::RotatedAuthKeys)
            .await?;
        tracing::info!(account_id = %account_id, "auth keys rotated");
        Ok(())
    }

    async fn authenticate(
        &self,
        account_id: &FullAccountId,
        auth_public_key: &str,
        scope: AuthTokenScope,
    ) -> Result<(), RotateAuthKeysError> {
        let tokens = self
            .auth
            .authenticate(account_id, auth_public_key, scope)
            .await
            .map_err(|source| RotateAuthKeysError::FailedToAuthenticate { scope, source })?;
        self.auth_tokens
            .set_tokens(account_id, tokens, scope)
            .await?;
        tracing::debug!(account_id = %account_id, ?scope, "stored auth tokens");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_binds_all_destination_keys() {
        use trefoil_testkit::fixtures::{app_key_bundle, hw_key_bundle};

        let challenge = CompletionChallenge::new(&app_key_bundle(1), &hw_key_bundle(1));
        let text = String::from_utf8(challenge.as_bytes().to_vec()).unwrap();

        assert!(text.starts_with(CHALLENGE_PREFIX));
        assert!(text.contains(hw_key_bundle(1).auth_key.as_str()));
        assert!(text.contains(app_key_bundle(1).recovery_auth_key.as_str()));
        assert_ne!(
            challenge,
            CompletionChallenge::new(&app_key_bundle(2), &hw_key_bundle(1))
        );
    }
}
