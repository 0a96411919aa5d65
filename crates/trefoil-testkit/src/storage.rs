//! Storage with failure injection.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use trefoil_core::effects::{MemoryStorage, StorageEffects, StorageError};

/// [`MemoryStorage`] that can be switched to fail reads or writes.
#[derive(Debug, Default)]
pub struct FailingStorage {
    inner: MemoryStorage,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FailingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageEffects for FailingStorage {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed(format!("injected failure for {key}")));
        }
        self.inner.store(key, value).await
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::ReadFailed(format!("injected failure for {key}")));
        }
        self.inner.retrieve(key).await
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(format!("injected failure for {key}")));
        }
        self.inner.remove(key).await
    }
}
