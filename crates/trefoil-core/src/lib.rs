//! # Trefoil Core
//!
//! Foundation crate for factor-loss recovery on a three-key (app, hardware,
//! server) Bitcoin wallet.
//!
//! ## What Belongs Here
//!
//! - Domain types: keys, keysets, keyboxes, recovery records, sweep transactions
//! - The canonical `Recovery` status type
//! - Effect traits for every external collaborator (remote authority, wallet
//!   views, key storage, session signals, storage)
//! - Runtime primitives shared by higher layers: `RecoveryLock`, `TaskRegistry`
//! - Configuration
//!
//! ## What Does NOT Belong Here
//!
//! - Reconciliation, syncing and recovery orchestration (`trefoil-recovery`)
//! - Sweep generation (`trefoil-sweep`)
//! - Test doubles (`trefoil-testkit`)

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod effects;
pub mod errors;
pub mod identifiers;
pub mod keys;
pub mod keyset;
pub mod lock;
pub mod recovery;
pub mod sweep;
pub mod task_registry;

pub use config::{RecoveryConfig, SweepConfig, TrefoilConfig};
pub use errors::{Result, TrefoilError};
pub use identifiers::{F8eKeysetId, FullAccountId, LocalId};
pub use keys::{
    AppGlobalAuthPublicKey, AppKeyBundle, AppRecoveryAuthPublicKey, AppSpendingPublicKey,
    DescriptorPublicKey, F8eSpendingPublicKey, HwAuthPublicKey, HwFactorProofOfPossession,
    HwKeyBundle, HwSpendingPublicKey, SealedCsek, Signature,
};
pub use keyset::{F8eSpendingKeyset, FullAccount, Keybox, SpendingKeyset};
pub use lock::{RecoveryLock, RecoveryLockGuard};
pub use recovery::{
    InitiatedRecovery, LocalRecoveryAttempt, LocalRecoveryAttemptProgress,
    MaybeNoLongerRecovering, OutOfOrderProgress, PhysicalFactor, Recovery,
    ServerDependentRecovery, ServerIndependentProgress, ServerIndependentRecovery,
    ServerRecovery, StillRecovering,
};
pub use sweep::{SignaturePlan, Sweep, SweepContext, SweepPsbt};
pub use task_registry::TaskRegistry;

// Re-export the bitcoin primitives that appear in public signatures.
pub use bitcoin;
