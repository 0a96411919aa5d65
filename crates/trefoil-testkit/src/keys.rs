//! Fake key storage, generation, signing and verification.
//!
//! Signatures are plain strings `signed-by:<public key>`; the verifier accepts
//! exactly those, so a test produces a valid hardware signature with
//! [`signature_by`].

use async_trait::async_trait;
use bitcoin::Network;
use parking_lot::Mutex;
use std::collections::HashSet;
use trefoil_core::effects::{
    AppAuthKeySigner, AppKeysGenerator, KeyMaterialError, KeyMaterialStore, SignatureVerifier,
};
use trefoil_core::{AppGlobalAuthPublicKey, AppKeyBundle, AppSpendingPublicKey, Signature};

use crate::fixtures::app_key_bundle;

/// The signature the fake signer produces for `public_key`.
pub fn signature_by(public_key: &str) -> Signature {
    Signature(format!("signed-by:{public_key}"))
}

#[derive(Debug, Default)]
struct KeyMaterial {
    app_private_keys: HashSet<AppSpendingPublicKey>,
    paired_fingerprint: Option<String>,
    known_fingerprints: Vec<String>,
    error: Option<KeyMaterialError>,
}

/// Key store holding whichever private keys a test says it holds.
#[derive(Debug, Default)]
pub struct FakeKeyMaterialStore {
    material: Mutex<KeyMaterial>,
}

impl FakeKeyMaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app_private_key(self, public_key: AppSpendingPublicKey) -> Self {
        self.material.lock().app_private_keys.insert(public_key);
        self
    }

    pub fn with_paired_hardware(self, fingerprint: impl Into<String>) -> Self {
        self.material.lock().paired_fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_known_hardware(self, fingerprint: impl Into<String>) -> Self {
        self.material.lock().known_fingerprints.push(fingerprint.into());
        self
    }

    pub fn fail_with(&self, error: Option<KeyMaterialError>) {
        self.material.lock().error = error;
    }
}

#[async_trait]
impl KeyMaterialStore for FakeKeyMaterialStore {
    async fn has_app_spending_private_key(
        &self,
        public_key: &AppSpendingPublicKey,
    ) -> Result<bool, KeyMaterialError> {
        let material = self.material.lock();
        match material.error.clone() {
            Some(err) => Err(err),
            None => Ok(material.app_private_keys.contains(public_key)),
        }
    }

    async fn paired_hardware_fingerprint(&self) -> Option<String> {
        self.material.lock().paired_fingerprint.clone()
    }

    async fn known_hardware_fingerprints(&self) -> Vec<String> {
        self.material.lock().known_fingerprints.clone()
    }
}

/// Hands out `app_key_bundle(100)`, `app_key_bundle(101)`, ... in order.
#[derive(Debug, Default)]
pub struct FakeAppKeysGenerator {
    generated: Mutex<u32>,
    error: Mutex<Option<KeyMaterialError>>,
}

impl FakeAppKeysGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: Option<KeyMaterialError>) {
        *self.error.lock() = error;
    }

    pub fn generated_count(&self) -> u32 {
        *self.generated.lock()
    }
}

#[async_trait]
impl AppKeysGenerator for FakeAppKeysGenerator {
    async fn generate_key_bundle(
        &self,
        network: Network,
    ) -> Result<AppKeyBundle, KeyMaterialError> {
        if let Some(err) = self.error.lock().clone() {
            return Err(err);
        }
        let mut generated = self.generated.lock();
        let mut bundle = app_key_bundle(100 + *generated);
        *generated += 1;
        bundle.network = network;
        Ok(bundle)
    }
}

#[derive(Debug, Default)]
pub struct FakeAppAuthKeySigner {
    signed: Mutex<Vec<(AppGlobalAuthPublicKey, Vec<u8>)>>,
    error: Mutex<Option<KeyMaterialError>>,
}

impl FakeAppAuthKeySigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: Option<KeyMaterialError>) {
        *self.error.lock() = error;
    }

    /// Messages signed so far with the key that signed them.
    pub fn signed(&self) -> Vec<(AppGlobalAuthPublicKey, Vec<u8>)> {
        self.signed.lock().clone()
    }
}

#[async_trait]
impl AppAuthKeySigner for FakeAppAuthKeySigner {
    async fn sign_with_global_auth_key(
        &self,
        public_key: &AppGlobalAuthPublicKey,
        message: &[u8],
    ) -> Result<Signature, KeyMaterialError> {
        if let Some(err) = self.error.lock().clone() {
            return Err(err);
        }
        self.signed
            .lock()
            .push((public_key.clone(), message.to_vec()));
        Ok(signature_by(public_key.as_str()))
    }
}

/// Accepts exactly [`signature_by`] for the given key.
#[derive(Debug, Default, Clone, Copy)]
pub struct FakeSignatureVerifier;

impl SignatureVerifier for FakeSignatureVerifier {
    fn verify(&self, _message: &[u8], signature: &Signature, public_key: &str) -> bool {
        *signature == signature_by(public_key)
    }
}
