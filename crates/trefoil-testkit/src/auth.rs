//! Fake authentication, token storage and relationship services.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use trefoil_core::effects::{
    AccountAuthTokens, AuthTokenScope, AuthTokenService, AuthTokensStore, AuthTokensStoreError,
    F8eError, RelationshipsService,
};
use trefoil_core::FullAccountId;

/// Issues tokens naming the key and scope they were issued for.
#[derive(Debug, Default)]
pub struct FakeAuthTokenService {
    calls: Mutex<Vec<(String, AuthTokenScope)>>,
    errors: Mutex<HashMap<AuthTokenScope, F8eError>>,
}

impl FakeAuthTokenService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_scope_with(&self, scope: AuthTokenScope, error: F8eError) {
        self.errors.lock().insert(scope, error);
    }

    /// `(auth public key, scope)` per authentication, in call order.
    pub fn calls(&self) -> Vec<(String, AuthTokenScope)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AuthTokenService for FakeAuthTokenService {
    async fn authenticate(
        &self,
        _full_account_id: &FullAccountId,
        auth_public_key: &str,
        scope: AuthTokenScope,
    ) -> Result<AccountAuthTokens, F8eError> {
        self.calls.lock().push((auth_public_key.to_string(), scope));
        if let Some(err) = self.errors.lock().get(&scope).cloned() {
            return Err(err);
        }
        Ok(AccountAuthTokens {
            access_token: format!("access:{scope:?}:{auth_public_key}"),
            refresh_token: format!("refresh:{scope:?}:{auth_public_key}"),
        })
    }
}

#[derive(Debug, Default)]
pub struct FakeAuthTokensStore {
    tokens: Mutex<HashMap<AuthTokenScope, AccountAuthTokens>>,
    error: Mutex<Option<AuthTokensStoreError>>,
}

impl FakeAuthTokensStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: Option<AuthTokensStoreError>) {
        *self.error.lock() = error;
    }

    pub fn tokens(&self, scope: AuthTokenScope) -> Option<AccountAuthTokens> {
        self.tokens.lock().get(&scope).cloned()
    }
}

#[async_trait]
impl AuthTokensStore for FakeAuthTokensStore {
    async fn set_tokens(
        &self,
        _full_account_id: &FullAccountId,
        tokens: AccountAuthTokens,
        scope: AuthTokenScope,
    ) -> Result<(), AuthTokensStoreError> {
        if let Some(err) = self.error.lock().clone() {
            return Err(err);
        }
        self.tokens.lock().insert(scope, tokens);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeRelationshipsService {
    removals: Mutex<usize>,
    error: Mutex<Option<F8eError>>,
}

impl FakeRelationshipsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: Option<F8eError>) {
        *self.error.lock() = error;
    }

    pub fn removal_calls(&self) -> usize {
        *self.removals.lock()
    }
}

#[async_trait]
impl RelationshipsService for FakeRelationshipsService {
    async fn remove_protected_customer_relationships(
        &self,
        _full_account_id: &FullAccountId,
    ) -> Result<(), F8eError> {
        *self.removals.lock() += 1;
        match self.error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
