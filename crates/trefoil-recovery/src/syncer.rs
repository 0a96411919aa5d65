//! Recovery Syncer
//!
//! Polls the remote authority for the account's Delay & Notify status and
//! caches the answer in the [`RecoveryStore`]. Overlapping syncs are
//! coalesced: a caller that waited behind a successful sync returns without
//! issuing its own remote call.

use crate::store::{RecoveryStore, RecoveryStoreError};
use futures::stream::BoxStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use trefoil_core::effects::{AppSessionManager, F8eError, F8eRecoveryService};
use trefoil_core::{FullAccountId, Recovery, RecoveryLock, TaskRegistry};

/// Sync failure. The store is not updated when returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("failed to fetch recovery status: {0}")]
    F8e(#[from] F8eError),
    #[error("failed to persist recovery status: {0}")]
    Store(#[from] RecoveryStoreError),
}

pub struct RecoverySyncer {
    f8e: Arc<dyn F8eRecoveryService>,
    store: Arc<RecoveryStore>,
    recovery_lock: Arc<RecoveryLock>,
    session: Arc<dyn AppSessionManager>,
    /// Coalesces overlapping syncs; separate from the recovery lock.
    sync_lock: Mutex<()>,
    /// Bumped after every successful sync.
    generation: AtomicU64,
}

impl RecoverySyncer {
    pub fn new(
        f8e: Arc<dyn F8eRecoveryService>,
        store: Arc<RecoveryStore>,
        recovery_lock: Arc<RecoveryLock>,
        session: Arc<dyn AppSessionManager>,
    ) -> Self {
        Self {
            f8e,
            store,
            recovery_lock,
            session,
            sync_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Fetch the remote status and write it into the store.
    pub async fn perform_sync(&self, full_account_id: &FullAccountId) -> Result<(), SyncError> {
        let observed = self.generation.load(Ordering::Acquire);
        let _sync = self.sync_lock.lock().await;
        if self.generation.load(Ordering::Acquire) != observed {
            tracing::debug!(account_id = %full_account_id, "recovery sync coalesced");
            return Ok(());
        }

        let _recovery = self.recovery_lock.lock().await;
        let server_recovery = self.f8e.get_delay_notify_status(full_account_id).await?;
        tracing::debug!(
            account_id = %full_account_id,
            active = server_recovery.is_some(),
            "fetched recovery status"
        );
        self.store.set_active_server_recovery(server_recovery).await?;

        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Spawn the foreground-gated polling loop on `registry`.
    ///
    /// Failures are logged and the loop carries on at the next tick.
    pub fn launch_sync(
        self: &Arc<Self>,
        registry: &TaskRegistry,
        full_account_id: FullAccountId,
        interval: Duration,
    ) {
        let syncer = Arc::clone(self);
        registry.spawn_foreground_interval(self.session.clone(), interval, move || {
            let syncer = Arc::clone(&syncer);
            let full_account_id = full_account_id.clone();
            async move {
                if let Err(err) = syncer.perform_sync(&full_account_id).await {
                    tracing::warn!(account_id = %full_account_id, error = %err, "recovery sync failed");
                }
            }
        });
    }

    /// De-duplicated canonical recovery status.
    pub fn recovery_status(&self) -> BoxStream<'static, Recovery> {
        self.store.observe_canonical_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use trefoil_core::effects::{AppSession, AppSessionState, MemoryStorage};
    use trefoil_core::PhysicalFactor;
    use trefoil_testkit::f8e::FakeF8eRecoveryService;
    use trefoil_testkit::fixtures::{account_id, local_attempt, matching_server_recovery};

    fn syncer(f8e: Arc<FakeF8eRecoveryService>) -> (Arc<RecoverySyncer>, Arc<RecoveryStore>) {
        let store = Arc::new(RecoveryStore::new(Arc::new(MemoryStorage::new())));
        let syncer = Arc::new(RecoverySyncer::new(
            f8e,
            store.clone(),
            Arc::new(RecoveryLock::new()),
            Arc::new(AppSession::new(AppSessionState::Foreground)),
        ));
        (syncer, store)
    }

    #[tokio::test]
    async fn sync_caches_remote_snapshot() {
        let f8e = Arc::new(FakeF8eRecoveryService::new());
        let server = matching_server_recovery(&local_attempt(PhysicalFactor::App));
        f8e.set_active_recovery(Some(server.clone()));
        let (syncer, store) = syncer(f8e);

        syncer.perform_sync(&account_id()).await.unwrap();

        assert_eq!(store.records().await.unwrap().server_recovery, Some(server));
        assert_eq!(
            store.current_status(),
            Recovery::SomeoneElseIsRecovering {
                lost_factor: PhysicalFactor::App
            }
        );
    }

    #[tokio::test]
    async fn remote_failure_leaves_store_untouched() {
        let f8e = Arc::new(FakeF8eRecoveryService::new());
        f8e.set_active_recovery(Some(matching_server_recovery(&local_attempt(
            PhysicalFactor::App,
        ))));
        let (syncer, store) = syncer(f8e.clone());
        syncer.perform_sync(&account_id()).await.unwrap();
        let before = store.records().await.unwrap();

        f8e.fail_status_with(Some(F8eError::connectivity("offline")));
        let err = syncer.perform_sync(&account_id()).await.unwrap_err();

        assert_matches!(err, SyncError::F8e(F8eError::Connectivity { .. }));
        assert_eq!(store.records().await.unwrap(), before);
    }
}
