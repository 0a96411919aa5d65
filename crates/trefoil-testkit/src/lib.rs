//! Trefoil Testing Infrastructure
//!
//! Deterministic in-memory fakes for every effect trait in
//! `trefoil_core::effects`, plus fixtures for accounts, keysets and recovery
//! records.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! trefoil-testkit = { path = "../trefoil-testkit" }
//! ```
//!
//! Fakes record the calls they receive and can be told to fail, so tests
//! assert on both outcomes and side effects.
//!
//! # Blocking Lock Usage
//!
//! Fakes keep their state behind `parking_lot::Mutex`; no lock is held
//! across an `.await`.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod account;
pub mod auth;
pub mod f8e;
pub mod fixtures;
pub mod keys;
pub mod storage;
pub mod wallet;

pub use account::FakeAccountProvider;
pub use auth::{FakeAuthTokenService, FakeAuthTokensStore, FakeRelationshipsService};
pub use f8e::{FakeAddressWatchRegistrar, FakeF8eRecoveryService};
pub use keys::{FakeAppAuthKeySigner, FakeAppKeysGenerator, FakeKeyMaterialStore, FakeSignatureVerifier};
pub use storage::FailingStorage;
pub use wallet::{
    FakeChaincodeDelegationTweaker, FakeDescriptorBackupVerifier, FakeSpendingWallet,
    FakeWalletProvider, TweakKind,
};

use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test subscriber once per test binary. Honours `RUST_LOG`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
