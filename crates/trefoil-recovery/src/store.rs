//! Recovery State Store
//!
//! Transactional persistence of the local recovery attempt and the cached
//! server snapshot. Both records are serialised into one storage value, so a
//! write is a single atomic `store`: a crash mid-transaction leaves the
//! previous pair intact.
//!
//! The canonical status stream is derived from an in-memory copy published
//! after each successful write. Reconciliation runs on the whole pair, so
//! subscribers never see one record updated without the other.

use crate::reconciler::reconcile;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_stream::wrappers::WatchStream;
use trefoil_core::effects::{StorageEffects, StorageError};
use trefoil_core::recovery::{
    LocalRecoveryAttempt, LocalRecoveryAttemptProgress, OutOfOrderProgress, Recovery,
    ServerRecovery,
};

const RECOVERY_STATE_KEY: &str = "recovery/state";

/// Recovery store failure. The persisted state is unchanged when returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecoveryStoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("corrupt recovery state: {message}")]
    Serialization { message: String },
    #[error(transparent)]
    OutOfOrderProgress(#[from] OutOfOrderProgress),
}

impl From<serde_json::Error> for RecoveryStoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

/// The two persisted records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRecords {
    pub local_attempt: Option<LocalRecoveryAttempt>,
    pub server_recovery: Option<ServerRecovery>,
}

impl RecoveryRecords {
    pub fn reconcile(&self) -> Recovery {
        reconcile(self.local_attempt.as_ref(), self.server_recovery.as_ref())
    }
}

pub struct RecoveryStore {
    storage: Arc<dyn StorageEffects>,
    /// Serialises read-modify-write transactions.
    write_lock: Mutex<()>,
    /// `None` until the persisted state has been read once.
    records_tx: watch::Sender<Option<RecoveryRecords>>,
}

impl RecoveryStore {
    pub fn new(storage: Arc<dyn StorageEffects>) -> Self {
        let (records_tx, _records_rx) = watch::channel(None);
        Self {
            storage,
            write_lock: Mutex::new(()),
            records_tx,
        }
    }

    /// Read the persisted state and publish it to status subscribers.
    pub async fn load(&self) -> Result<RecoveryRecords, RecoveryStoreError> {
        let _guard = self.write_lock.lock().await;
        let records = self.read_persisted().await?;
        self.records_tx.send_replace(Some(records.clone()));
        Ok(records)
    }

    /// Current persisted records.
    pub async fn records(&self) -> Result<RecoveryRecords, RecoveryStoreError> {
        let _guard = self.write_lock.lock().await;
        self.read_persisted().await
    }

    /// Cache the server's view. Clearing it also purges a local attempt the
    /// server never confirmed.
    pub async fn set_active_server_recovery(
        &self,
        server_recovery: Option<ServerRecovery>,
    ) -> Result<(), RecoveryStoreError> {
        self.transaction(|records| {
            match server_recovery {
                Some(server) => {
                    if let Some(attempt) = records.local_attempt.as_mut() {
                        if server.has_destination_keys_of(attempt) {
                            attempt.had_server_recovery = true;
                        }
                    }
                    records.server_recovery = Some(server);
                }
                None => {
                    records.server_recovery = None;
                    let never_confirmed = records.local_attempt.as_ref().is_some_and(|attempt| {
                        !attempt.had_server_recovery
                            && attempt.sealed_csek.is_none()
                            && !attempt.is_server_independent()
                    });
                    if never_confirmed {
                        tracing::info!("purging local recovery attempt the server never confirmed");
                        records.local_attempt = None;
                    }
                }
            }
            Ok(())
        })
        .await
    }

    /// Record a milestone of the local attempt.
    pub async fn set_local_progress(
        &self,
        progress: LocalRecoveryAttemptProgress,
    ) -> Result<(), RecoveryStoreError> {
        let milestone = progress.name();
        let server_canceled = matches!(
            progress,
            LocalRecoveryAttemptProgress::CompletionAttemptFailedDueToServerCancellation
        );
        self.transaction(|records| {
            let next = LocalRecoveryAttempt::apply(records.local_attempt.as_ref(), progress)?;
            // A finished or server-canceled recovery has no server snapshot.
            if next.is_none() || server_canceled {
                records.server_recovery = None;
            }
            records.local_attempt = next;
            Ok(())
        })
        .await?;
        tracing::debug!(milestone, "recorded local recovery progress");
        Ok(())
    }

    /// Forget both records.
    pub async fn clear(&self) -> Result<(), RecoveryStoreError> {
        self.transaction(|records| {
            *records = RecoveryRecords::default();
            Ok(())
        })
        .await
    }

    /// Reconciled status as of the last published write.
    pub fn current_status(&self) -> Recovery {
        status_of(self.records_tx.borrow().as_ref())
    }

    /// Stream of reconciled statuses, starting with the current one.
    ///
    /// Emits `Loading` until [`load`](Self::load) completes. Consecutive equal
    /// statuses are collapsed.
    pub fn observe_canonical_status(&self) -> BoxStream<'static, Recovery> {
        let mut last: Option<Recovery> = None;
        WatchStream::new(self.records_tx.subscribe())
            .map(|records| status_of(records.as_ref()))
            .filter_map(move |status| {
                let emit = if last.as_ref() == Some(&status) {
                    None
                } else {
                    last = Some(status.clone());
                    Some(status)
                };
                futures::future::ready(emit)
            })
            .boxed()
    }

    async fn transaction<F>(&self, mutate: F) -> Result<(), RecoveryStoreError>
    where
        F: FnOnce(&mut RecoveryRecords) -> Result<(), RecoveryStoreError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_persisted().await?;
        mutate(&mut records)?;

        let bytes = serde_json::to_vec(&records)?;
        self.storage.store(RECOVERY_STATE_KEY, bytes).await?;
        self.records_tx.send_replace(Some(records));
        Ok(())
    }

    async fn read_persisted(&self) -> Result<RecoveryRecords, RecoveryStoreError> {
        match self.storage.retrieve(RECOVERY_STATE_KEY).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(RecoveryRecords::default()),
        }
    }
}

fn status_of(records: Option<&RecoveryRecords>) -> Recovery {
    records.map_or(Recovery::Loading, RecoveryRecords::reconcile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use trefoil_core::effects::MemoryStorage;
    use trefoil_core::recovery::{PhysicalFactor, StillRecovering};
    use trefoil_core::SealedCsek;
    use trefoil_testkit::fixtures::{created_pending_keybundles, matching_server_recovery};
    use trefoil_testkit::storage::FailingStorage;

    fn store() -> RecoveryStore {
        RecoveryStore::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn status_is_loading_until_loaded() {
        let store = store();
        assert_eq!(store.current_status(), Recovery::Loading);
        store.load().await.unwrap();
        assert_eq!(store.current_status(), Recovery::NoActiveRecovery);
    }

    #[tokio::test]
    async fn new_attempt_replaces_previous_one() {
        let store = store();
        store
            .set_local_progress(created_pending_keybundles(PhysicalFactor::App, 1))
            .await
            .unwrap();
        store
            .set_local_progress(created_pending_keybundles(PhysicalFactor::Hardware, 2))
            .await
            .unwrap();

        let attempt = store.records().await.unwrap().local_attempt.unwrap();
        assert_eq!(attempt.lost_factor, PhysicalFactor::Hardware);
    }

    #[tokio::test]
    async fn clearing_server_purges_unconfirmed_attempt() {
        let store = store();
        store
            .set_local_progress(created_pending_keybundles(PhysicalFactor::App, 1))
            .await
            .unwrap();
        store.set_active_server_recovery(None).await.unwrap();

        assert_eq!(store.records().await.unwrap(), RecoveryRecords::default());
    }

    #[tokio::test]
    async fn confirmed_attempt_survives_server_clear() {
        let store = store();
        store
            .set_local_progress(created_pending_keybundles(PhysicalFactor::App, 1))
            .await
            .unwrap();
        let attempt = store.records().await.unwrap().local_attempt.unwrap();
        store
            .set_active_server_recovery(Some(matching_server_recovery(&attempt)))
            .await
            .unwrap();
        store.set_active_server_recovery(None).await.unwrap();

        assert_eq!(
            store.current_status(),
            Recovery::NoLongerRecovering {
                lost_factor: PhysicalFactor::App
            }
        );
    }

    #[tokio::test]
    async fn attempting_completion_survives_restart() {
        let storage = Arc::new(MemoryStorage::new());
        let store = RecoveryStore::new(storage.clone());
        store
            .set_local_progress(created_pending_keybundles(PhysicalFactor::Hardware, 1))
            .await
            .unwrap();
        let attempt = store.records().await.unwrap().local_attempt.unwrap();
        store
            .set_active_server_recovery(Some(matching_server_recovery(&attempt)))
            .await
            .unwrap();
        store
            .set_local_progress(LocalRecoveryAttemptProgress::AttemptingCompletion {
                sealed_csek: SealedCsek(vec![9]),
            })
            .await
            .unwrap();
        drop(store);

        let restarted = RecoveryStore::new(storage);
        restarted.load().await.unwrap();
        restarted.set_active_server_recovery(None).await.unwrap();

        assert_matches!(
            restarted.current_status(),
            Recovery::StillRecovering(StillRecovering::MaybeNoLongerRecovering(_))
        );
    }

    #[tokio::test]
    async fn server_cancellation_drops_cached_server_recovery() {
        let store = store();
        store
            .set_local_progress(created_pending_keybundles(PhysicalFactor::Hardware, 1))
            .await
            .unwrap();
        let attempt = store.records().await.unwrap().local_attempt.unwrap();
        store
            .set_active_server_recovery(Some(matching_server_recovery(&attempt)))
            .await
            .unwrap();
        store
            .set_local_progress(LocalRecoveryAttemptProgress::AttemptingCompletion {
                sealed_csek: SealedCsek(vec![9]),
            })
            .await
            .unwrap();

        store
            .set_local_progress(
                LocalRecoveryAttemptProgress::CompletionAttemptFailedDueToServerCancellation,
            )
            .await
            .unwrap();

        let records = store.records().await.unwrap();
        assert!(records.server_recovery.is_none());
        assert!(records.local_attempt.is_some());
        assert_eq!(
            store.current_status(),
            Recovery::NoLongerRecovering {
                lost_factor: PhysicalFactor::Hardware
            }
        );
    }

    #[tokio::test]
    async fn out_of_order_progress_leaves_state_untouched() {
        let store = store();
        store
            .set_local_progress(created_pending_keybundles(PhysicalFactor::App, 1))
            .await
            .unwrap();
        let before = store.records().await.unwrap();

        let err = store
            .set_local_progress(LocalRecoveryAttemptProgress::BackedUpToCloud)
            .await
            .unwrap_err();
        assert_matches!(err, RecoveryStoreError::OutOfOrderProgress(_));
        assert_eq!(store.records().await.unwrap(), before);
    }

    #[tokio::test]
    async fn failed_write_is_not_published() {
        let storage = Arc::new(FailingStorage::new());
        let store = RecoveryStore::new(storage.clone());
        store.load().await.unwrap();

        storage.fail_writes(true);
        let err = store
            .set_local_progress(created_pending_keybundles(PhysicalFactor::App, 1))
            .await
            .unwrap_err();

        assert_matches!(err, RecoveryStoreError::Storage(_));
        assert_eq!(store.current_status(), Recovery::NoActiveRecovery);
    }

    #[tokio::test]
    async fn status_stream_deduplicates() {
        let store = store();
        let mut statuses = store.observe_canonical_status();
        assert_eq!(statuses.next().await, Some(Recovery::Loading));

        store.load().await.unwrap();
        assert_eq!(statuses.next().await, Some(Recovery::NoActiveRecovery));

        // Writes that reconcile to the same status are not re-emitted.
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        store
            .set_local_progress(created_pending_keybundles(PhysicalFactor::App, 1))
            .await
            .unwrap();
        let attempt = store.records().await.unwrap().local_attempt.unwrap();
        store
            .set_active_server_recovery(Some(matching_server_recovery(&attempt)))
            .await
            .unwrap();

        assert_matches!(
            statuses.next().await,
            Some(Recovery::StillRecovering(StillRecovering::ServerDependent(_)))
        );
    }
}
