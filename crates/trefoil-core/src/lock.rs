//! Recovery lock shared by every mutating recovery operation.

use tokio::sync::{Mutex, MutexGuard};

/// Non-reentrant lock serialising initiation, cancellation, completion and
/// background sync writes.
///
/// Owned by the composition root and injected as `Arc<RecoveryLock>`.
/// Acquiring it twice from the same task deadlocks.
#[derive(Debug, Default)]
pub struct RecoveryLock {
    inner: Mutex<()>,
}

/// Held while a recovery mutation is in flight.
pub type RecoveryLockGuard<'a> = MutexGuard<'a, ()>;

impl RecoveryLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access.
    pub async fn lock(&self) -> RecoveryLockGuard<'_> {
        self.inner.lock().await
    }

    /// Take the lock only if nobody holds it.
    pub fn try_lock(&self) -> Option<RecoveryLockGuard<'_>> {
        self.inner.try_lock().ok()
    }
}
