//! Effect trait definitions for the collaborators this workspace drives.
//!
//! Traits define **what** a collaborator can do; implementations live with
//! the surrounding application (or in `trefoil-testkit` for tests). Every
//! component receives its effects as `Arc<dyn Trait>` so tests can swap in
//! deterministic fakes.

pub mod auth;
pub mod f8e;
pub mod keys;
pub mod session;
pub mod storage;
pub mod wallet;

pub use auth::{
    AccountAuthTokens, AuthTokenScope, AuthTokenService, AuthTokensStore, AuthTokensStoreError,
    RelationshipsService,
};
pub use f8e::{
    AddressWatchRegistrar, CompleteDelayNotifyRequest, F8eClientErrorCode, F8eError,
    F8eRecoveryService, InitiateDelayNotifyRequest, WatchAddress,
};
pub use keys::{
    AppAuthKeySigner, AppKeysGenerator, KeyMaterialError, KeyMaterialStore, SignatureVerifier,
};
pub use session::{AccountProvider, AppSession, AppSessionManager, AppSessionState};
pub use storage::{MemoryStorage, StorageEffects, StorageError};
pub use wallet::{
    ChaincodeDelegationTweaker, DescriptorBackupVerifier, SpendingWallet, TweakError,
    UnsignedTransaction, WalletError, WalletProvider,
};
