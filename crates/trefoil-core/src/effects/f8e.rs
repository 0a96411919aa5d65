//! Remote recovery authority and address-watch effects.

use crate::identifiers::{F8eKeysetId, FullAccountId};
use crate::keys::{
    AppGlobalAuthPublicKey, AppRecoveryAuthPublicKey, HwAuthPublicKey, HwFactorProofOfPossession,
    Signature,
};
use crate::keyset::SpendingKeyset;
use crate::recovery::{PhysicalFactor, ServerRecovery};
use async_trait::async_trait;
use bitcoin::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Semantic error codes returned by the remote authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum F8eClientErrorCode {
    /// There is no recovery in progress for the account.
    NoRecoveryExists,
    /// The action needs out-of-band (comms) verification first.
    VerificationRequired,
    /// A recovery is already in progress.
    RecoveryAlreadyExists,
    /// A submitted signature did not verify.
    InvalidSignature,
    Other(String),
}

/// Remote call failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum F8eError {
    /// Network-level failure; the request may not have reached the server.
    #[error("connectivity error: {message}")]
    Connectivity { message: String },
    /// The server understood and rejected the request.
    #[error("client error: {code:?}")]
    Client { code: F8eClientErrorCode },
    #[error("server error: {message}")]
    Server { message: String },
}

impl F8eError {
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity {
            message: message.into(),
        }
    }

    pub fn client(code: F8eClientErrorCode) -> Self {
        Self::Client { code }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Whether the failure carries the given client error code.
    pub fn is_client_error(&self, expected: &F8eClientErrorCode) -> bool {
        matches!(self, Self::Client { code } if code == expected)
    }
}

/// Arguments to start a Delay & Notify recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateDelayNotifyRequest {
    pub full_account_id: FullAccountId,
    pub lost_factor: PhysicalFactor,
    pub destination_app_global_auth_pub_key: AppGlobalAuthPublicKey,
    pub destination_app_recovery_auth_pub_key: AppRecoveryAuthPublicKey,
    pub destination_hardware_auth_pub_key: HwAuthPublicKey,
    pub delay_period: Duration,
    /// Required when the app is the lost factor.
    pub hw_proof_of_possession: Option<HwFactorProofOfPossession>,
}

/// Arguments to complete a recovery once its delay has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteDelayNotifyRequest {
    pub challenge: Vec<u8>,
    pub app_signature: Signature,
    pub hardware_signature: Signature,
}

/// The remote recovery authority.
#[async_trait]
pub trait F8eRecoveryService: Send + Sync {
    async fn initiate_delay_notify(
        &self,
        request: InitiateDelayNotifyRequest,
    ) -> Result<ServerRecovery, F8eError>;

    async fn cancel_delay_notify(
        &self,
        full_account_id: &FullAccountId,
        hw_proof_of_possession: Option<HwFactorProofOfPossession>,
    ) -> Result<(), F8eError>;

    /// The active recovery, or `None` when nothing is in progress.
    async fn get_delay_notify_status(
        &self,
        full_account_id: &FullAccountId,
    ) -> Result<Option<ServerRecovery>, F8eError>;

    async fn complete_delay_notify(
        &self,
        full_account_id: &FullAccountId,
        request: CompleteDelayNotifyRequest,
    ) -> Result<(), F8eError>;

    /// Authoritative list of every keyset the account has owned.
    async fn list_keysets(
        &self,
        full_account_id: &FullAccountId,
    ) -> Result<Vec<SpendingKeyset>, F8eError>;
}

/// An address the remote should watch for incoming funds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchAddress {
    pub address: Address,
    pub keyset_id: F8eKeysetId,
}

/// Remote address-watch registration.
#[async_trait]
pub trait AddressWatchRegistrar: Send + Sync {
    async fn register_watch_addresses(
        &self,
        full_account_id: &FullAccountId,
        addresses: Vec<WatchAddress>,
    ) -> Result<(), F8eError>;
}
