//! # Trefoil Recovery
//!
//! Delay & Notify factor-loss recovery for a customer who lost either their
//! app or their hardware.
//!
//! ## What Belongs Here
//!
//! - The recovery state store and its canonical status stream
//! - Reconciliation of the local attempt against the server snapshot
//! - Background syncing of the server snapshot
//! - Initiation, cancellation and completion of a recovery
//!
//! ## What Does NOT Belong Here
//!
//! - Domain types and effect traits (`trefoil-core`)
//! - Sweeping funds out of superseded keysets (`trefoil-sweep`)
//! - Spending key rotation and cloud backup, which only report their
//!   milestones through [`RecoveryStore::set_local_progress`]
//!
//! ## Locking
//!
//! Every mutating operation (initiate, cancel, complete and the syncer's
//! fetch-and-write) holds the shared [`trefoil_core::RecoveryLock`]. The lock is
//! not reentrant, so none of these operations call each other.

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod canceler;
pub mod completer;
pub mod initiator;
pub mod reconciler;
pub mod store;
pub mod syncer;

pub use canceler::{CancelRecoveryError, RecoveryCanceler};
pub use completer::{
    CompletionChallenge, RecoveryAuthCompleter, RotateAuthKeysError, RotateAuthKeysRequest,
};
pub use initiator::{InitiateRecoveryError, LostAppRecoveryInitiator, LostHardwareRecoveryInitiator};
pub use reconciler::reconcile;
pub use store::{RecoveryRecords, RecoveryStore, RecoveryStoreError};
pub use syncer::{RecoverySyncer, SyncError};
