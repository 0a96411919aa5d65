//! Authentication and relationship effects used while completing a recovery.

use crate::effects::f8e::F8eError;
use crate::identifiers::FullAccountId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which session an auth token authorises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthTokenScope {
    /// Everyday account access.
    Global,
    /// Recovery-only access.
    Recovery,
}

/// Tokens returned by a successful authentication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for AccountAuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccountAuthTokens(<redacted>)")
    }
}

/// Authenticates with the remote using a locally-held auth key.
#[async_trait]
pub trait AuthTokenService: Send + Sync {
    /// Authenticate with the public key's private half.
    async fn authenticate(
        &self,
        full_account_id: &FullAccountId,
        auth_public_key: &str,
        scope: AuthTokenScope,
    ) -> Result<AccountAuthTokens, F8eError>;
}

/// Token persistence failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("auth token store error: {message}")]
pub struct AuthTokensStoreError {
    pub message: String,
}

/// Persists auth tokens per account and scope.
#[async_trait]
pub trait AuthTokensStore: Send + Sync {
    async fn set_tokens(
        &self,
        full_account_id: &FullAccountId,
        tokens: AccountAuthTokens,
        scope: AuthTokenScope,
    ) -> Result<(), AuthTokensStoreError>;
}

/// Social-recovery relationship management.
#[async_trait]
pub trait RelationshipsService: Send + Sync {
    /// Remove every relationship where this account is the protected customer.
    async fn remove_protected_customer_relationships(
        &self,
        full_account_id: &FullAccountId,
    ) -> Result<(), F8eError>;
}
