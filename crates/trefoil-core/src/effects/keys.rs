//! Local key material effects: generation, signing and lookup.
//!
//! Private keys never leave the implementations; callers deal in public keys.

use crate::keys::{AppGlobalAuthPublicKey, AppKeyBundle, AppSpendingPublicKey, Signature};
use async_trait::async_trait;
use bitcoin::Network;

/// Key storage or signing failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("key material error: {message}")]
pub struct KeyMaterialError {
    pub message: String,
}

impl KeyMaterialError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Lookup of locally-held signing material.
#[async_trait]
pub trait KeyMaterialStore: Send + Sync {
    /// Whether the private half of an app spending key is held locally.
    async fn has_app_spending_private_key(
        &self,
        public_key: &AppSpendingPublicKey,
    ) -> Result<bool, KeyMaterialError>;

    /// Master fingerprint of the currently paired hardware, if any.
    async fn paired_hardware_fingerprint(&self) -> Option<String>;

    /// Fingerprints of hardware this app has been paired with before.
    async fn known_hardware_fingerprints(&self) -> Vec<String>;
}

/// Generates fresh app key bundles.
#[async_trait]
pub trait AppKeysGenerator: Send + Sync {
    async fn generate_key_bundle(&self, network: Network)
        -> Result<AppKeyBundle, KeyMaterialError>;
}

/// Signs with locally-held app auth keys.
#[async_trait]
pub trait AppAuthKeySigner: Send + Sync {
    async fn sign_with_global_auth_key(
        &self,
        public_key: &AppGlobalAuthPublicKey,
        message: &[u8],
    ) -> Result<Signature, KeyMaterialError>;
}

/// Verifies signatures against hex-encoded public keys.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, message: &[u8], signature: &Signature, public_key: &str) -> bool;
}
