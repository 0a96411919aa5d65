//! End-to-end recovery flows across initiation, sync, cancel, completion and
//! restarts.

use assert_matches::assert_matches;
use std::sync::Arc;
use std::time::Duration;
use trefoil_core::effects::{
    AppSession, AppSessionState, F8eError, MemoryStorage, StorageEffects,
};
use trefoil_core::{
    AppGlobalAuthPublicKey, F8eSpendingKeyset, InitiatedRecovery, LocalRecoveryAttemptProgress,
    PhysicalFactor, Recovery, RecoveryLock, SealedCsek, ServerDependentRecovery,
    ServerIndependentRecovery, StillRecovering,
};
use trefoil_recovery::{
    LostAppRecoveryInitiator, LostHardwareRecoveryInitiator, RecoveryCanceler, RecoveryRecords,
    RecoveryStore, RecoverySyncer,
};
use trefoil_testkit::fixtures::{
    account_id, created_pending_keybundles, hw_key_bundle, local_attempt,
    matching_server_recovery, proof_of_possession, spending_keyset,
};
use trefoil_testkit::{init_test_tracing, FakeAppKeysGenerator, FakeF8eRecoveryService};

struct Harness {
    storage: Arc<MemoryStorage>,
    f8e: Arc<FakeF8eRecoveryService>,
    store: Arc<RecoveryStore>,
    lock: Arc<RecoveryLock>,
    generator: Arc<FakeAppKeysGenerator>,
}

impl Harness {
    fn new() -> Self {
        init_test_tracing();
        let storage = Arc::new(MemoryStorage::new());
        Self {
            store: Arc::new(RecoveryStore::new(storage.clone())),
            storage,
            f8e: Arc::new(FakeF8eRecoveryService::new()),
            lock: Arc::new(RecoveryLock::new()),
            generator: Arc::new(FakeAppKeysGenerator::new()),
        }
    }

    fn lost_hardware(&self) -> LostHardwareRecoveryInitiator {
        LostHardwareRecoveryInitiator::new(
            self.f8e.clone(),
            self.store.clone(),
            self.lock.clone(),
            self.generator.clone(),
            Duration::from_secs(20),
        )
    }

    fn lost_app(&self) -> LostAppRecoveryInitiator {
        LostAppRecoveryInitiator::new(
            self.f8e.clone(),
            self.store.clone(),
            self.lock.clone(),
            self.generator.clone(),
            Duration::from_secs(20),
        )
    }

    fn canceler(&self) -> RecoveryCanceler {
        RecoveryCanceler::new(self.f8e.clone(), self.store.clone(), self.lock.clone())
    }

    fn syncer(&self) -> RecoverySyncer {
        RecoverySyncer::new(
            self.f8e.clone(),
            self.store.clone(),
            self.lock.clone(),
            Arc::new(AppSession::new(AppSessionState::Foreground)),
        )
    }

    /// A fresh store over the same storage, as after an app restart.
    async fn restart(&self) -> RecoveryStore {
        let storage: Arc<dyn StorageEffects> = self.storage.clone();
        let store = RecoveryStore::new(storage);
        store.load().await.unwrap();
        store
    }
}

#[tokio::test]
async fn reinitiating_leaves_exactly_one_attempt() {
    let harness = Harness::new();
    harness
        .f8e
        .fail_initiate_with(Some(F8eError::connectivity("offline")));
    harness
        .lost_hardware()
        .initiate(&account_id(), hw_key_bundle(2))
        .await
        .unwrap_err();
    let abandoned = harness.store.records().await.unwrap().local_attempt.unwrap();

    harness.f8e.fail_initiate_with(None);
    harness
        .lost_app()
        .initiate(&account_id(), hw_key_bundle(0), proof_of_possession())
        .await
        .unwrap();

    let attempt = harness.store.records().await.unwrap().local_attempt.unwrap();
    assert_ne!(attempt.app_key_bundle, abandoned.app_key_bundle);
    assert_eq!(attempt.lost_factor, PhysicalFactor::App);
    assert_eq!(attempt.hw_key_bundle, hw_key_bundle(0));
    assert_eq!(harness.generator.generated_count(), 2);
}

#[tokio::test]
async fn unconfirmed_attempt_is_purged_by_sync() {
    let harness = Harness::new();
    harness
        .f8e
        .fail_initiate_with(Some(F8eError::connectivity("offline")));
    harness
        .lost_hardware()
        .initiate(&account_id(), hw_key_bundle(2))
        .await
        .unwrap_err();

    harness.syncer().perform_sync(&account_id()).await.unwrap();

    let records = harness.store.records().await.unwrap();
    assert!(records.local_attempt.is_none());
    assert_eq!(harness.store.current_status(), Recovery::NoActiveRecovery);
}

#[tokio::test]
async fn cancel_is_idempotent_when_already_canceled_remotely() {
    let harness = Harness::new();
    harness
        .lost_hardware()
        .initiate(&account_id(), hw_key_bundle(2))
        .await
        .unwrap();
    // Canceled from another device.
    harness.f8e.set_active_recovery(None);

    harness.canceler().cancel(&account_id(), None).await.unwrap();
    harness.canceler().cancel(&account_id(), None).await.unwrap();

    assert_eq!(harness.f8e.cancel_calls(), 2);
    assert_eq!(harness.store.records().await.unwrap(), RecoveryRecords::default());
    assert_eq!(harness.store.current_status(), Recovery::NoActiveRecovery);
}

#[tokio::test]
async fn remote_cancel_surfaces_as_no_longer_recovering() {
    let harness = Harness::new();
    harness
        .lost_hardware()
        .initiate(&account_id(), hw_key_bundle(2))
        .await
        .unwrap();
    harness.f8e.set_active_recovery(None);

    harness.syncer().perform_sync(&account_id()).await.unwrap();

    assert_eq!(
        harness.store.current_status(),
        Recovery::NoLongerRecovering {
            lost_factor: PhysicalFactor::Hardware
        }
    );
}

#[tokio::test]
async fn someone_else_recovering_is_detected() {
    let harness = Harness::new();
    let mut foreign = matching_server_recovery(&local_attempt(PhysicalFactor::App));
    foreign.destination_app_global_auth_pub_key = AppGlobalAuthPublicKey::new("attacker");
    harness.f8e.set_active_recovery(Some(foreign));

    harness.syncer().perform_sync(&account_id()).await.unwrap();

    assert_eq!(
        harness.store.current_status(),
        Recovery::SomeoneElseIsRecovering {
            lost_factor: PhysicalFactor::App
        }
    );
}

#[tokio::test]
async fn destination_key_change_ends_recovery() {
    let harness = Harness::new();
    harness
        .store
        .set_local_progress(created_pending_keybundles(PhysicalFactor::Hardware, 1))
        .await
        .unwrap();
    let attempt = harness.store.records().await.unwrap().local_attempt.unwrap();
    let server = matching_server_recovery(&attempt);
    harness
        .store
        .set_active_server_recovery(Some(server.clone()))
        .await
        .unwrap();

    assert_matches!(
        harness.store.current_status(),
        Recovery::StillRecovering(StillRecovering::ServerDependent(
            ServerDependentRecovery::InitiatedRecovery(InitiatedRecovery {
                lost_factor: PhysicalFactor::Hardware,
                ..
            })
        ))
    );

    let mut replaced = server;
    replaced.destination_app_global_auth_pub_key = AppGlobalAuthPublicKey::new("A2");
    harness
        .store
        .set_active_server_recovery(Some(replaced))
        .await
        .unwrap();

    assert_eq!(
        harness.store.current_status(),
        Recovery::NoLongerRecovering {
            lost_factor: PhysicalFactor::Hardware
        }
    );
}

#[tokio::test]
async fn attempting_completion_resumes_after_restart() {
    let harness = Harness::new();
    harness
        .lost_hardware()
        .initiate(&account_id(), hw_key_bundle(2))
        .await
        .unwrap();
    harness
        .store
        .set_local_progress(LocalRecoveryAttemptProgress::AttemptingCompletion {
            sealed_csek: SealedCsek(vec![1, 2, 3]),
        })
        .await
        .unwrap();

    let restarted = harness.restart().await;
    assert_matches!(
        restarted.current_status(),
        Recovery::StillRecovering(StillRecovering::ServerDependent(_))
    );

    restarted.set_active_server_recovery(None).await.unwrap();
    assert_matches!(
        restarted.current_status(),
        Recovery::StillRecovering(StillRecovering::MaybeNoLongerRecovering(m))
            if m.sealed_csek == SealedCsek(vec![1, 2, 3])
    );
}

#[tokio::test]
async fn rotated_auth_keys_resume_independent_of_server() {
    let harness = Harness::new();
    harness
        .lost_hardware()
        .initiate(&account_id(), hw_key_bundle(2))
        .await
        .unwrap();
    for progress in [
        LocalRecoveryAttemptProgress::AttemptingCompletion {
            sealed_csek: SealedCsek(vec![1]),
        },
        LocalRecoveryAttemptProgress::RotatedAuthKeys,
    ] {
        harness.store.set_local_progress(progress).await.unwrap();
    }

    let restarted = harness.restart().await;
    restarted.set_active_server_recovery(None).await.unwrap();

    assert_matches!(
        restarted.current_status(),
        Recovery::StillRecovering(StillRecovering::ServerIndependent(
            ServerIndependentRecovery::RotatedAuthKeys(_)
        ))
    );
}

#[tokio::test]
async fn milestones_run_to_completion() {
    let harness = Harness::new();
    harness
        .lost_hardware()
        .initiate(&account_id(), hw_key_bundle(2))
        .await
        .unwrap();
    let new_keyset: F8eSpendingKeyset = spending_keyset(5, true).f8e_spending_keyset;

    harness
        .store
        .set_local_progress(LocalRecoveryAttemptProgress::AttemptingCompletion {
            sealed_csek: SealedCsek(vec![1]),
        })
        .await
        .unwrap();
    harness
        .store
        .set_local_progress(LocalRecoveryAttemptProgress::RotatedAuthKeys)
        .await
        .unwrap();
    harness
        .store
        .set_local_progress(LocalRecoveryAttemptProgress::RotatedSpendingKeys {
            f8e_spending_keyset: new_keyset.clone(),
        })
        .await
        .unwrap();
    assert_matches!(
        harness.store.current_status(),
        Recovery::StillRecovering(StillRecovering::ServerIndependent(
            ServerIndependentRecovery::CreatedSpendingKeys { f8e_spending_keyset, .. }
        )) if f8e_spending_keyset == new_keyset
    );

    harness
        .store
        .set_local_progress(LocalRecoveryAttemptProgress::BackedUpToCloud)
        .await
        .unwrap();
    assert_matches!(
        harness.store.current_status(),
        Recovery::StillRecovering(StillRecovering::ServerIndependent(
            ServerIndependentRecovery::BackedUpToCloud { .. }
        ))
    );

    harness
        .store
        .set_local_progress(LocalRecoveryAttemptProgress::SweptFunds)
        .await
        .unwrap();
    assert_eq!(harness.store.current_status(), Recovery::NoActiveRecovery);
    assert_eq!(harness.store.records().await.unwrap(), RecoveryRecords::default());
}
