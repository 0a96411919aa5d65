//! Fake remote recovery authority and address-watch registrar.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::time::Duration;
use trefoil_core::effects::{
    AddressWatchRegistrar, CompleteDelayNotifyRequest, F8eClientErrorCode, F8eError,
    F8eRecoveryService, InitiateDelayNotifyRequest, WatchAddress,
};
use trefoil_core::{FullAccountId, HwFactorProofOfPossession, ServerRecovery, SpendingKeyset};

#[derive(Debug, Default)]
struct F8eState {
    active_recovery: Option<ServerRecovery>,
    keysets: Vec<SpendingKeyset>,

    status_error: Option<F8eError>,
    initiate_error: Option<F8eError>,
    cancel_error: Option<F8eError>,
    complete_error: Option<F8eError>,
    list_keysets_error: Option<F8eError>,
    status_delay: Option<Duration>,

    status_calls: usize,
    initiate_calls: usize,
    cancel_calls: usize,
    complete_calls: usize,
    list_keysets_calls: usize,
    last_initiate_request: Option<InitiateDelayNotifyRequest>,
    last_complete_request: Option<CompleteDelayNotifyRequest>,
}

/// In-memory Delay & Notify authority.
///
/// Holds at most one active recovery. Initiation replaces it, cancel and
/// completion clear it. Cancel and completion answer `NoRecoveryExists` when
/// nothing is active, like the real service.
#[derive(Debug, Default)]
pub struct FakeF8eRecoveryService {
    state: Mutex<F8eState>,
}

impl FakeF8eRecoveryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active_recovery(&self, recovery: Option<ServerRecovery>) {
        self.state.lock().active_recovery = recovery;
    }

    pub fn active_recovery(&self) -> Option<ServerRecovery> {
        self.state.lock().active_recovery.clone()
    }

    pub fn set_keysets(&self, keysets: Vec<SpendingKeyset>) {
        self.state.lock().keysets = keysets;
    }

    pub fn fail_status_with(&self, error: Option<F8eError>) {
        self.state.lock().status_error = error;
    }

    pub fn fail_initiate_with(&self, error: Option<F8eError>) {
        self.state.lock().initiate_error = error;
    }

    pub fn fail_cancel_with(&self, error: Option<F8eError>) {
        self.state.lock().cancel_error = error;
    }

    pub fn fail_complete_with(&self, error: Option<F8eError>) {
        self.state.lock().complete_error = error;
    }

    pub fn fail_list_keysets_with(&self, error: Option<F8eError>) {
        self.state.lock().list_keysets_error = error;
    }

    /// Make every status request take `delay` before answering.
    pub fn delay_status(&self, delay: Option<Duration>) {
        self.state.lock().status_delay = delay;
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().status_calls
    }

    pub fn initiate_calls(&self) -> usize {
        self.state.lock().initiate_calls
    }

    pub fn cancel_calls(&self) -> usize {
        self.state.lock().cancel_calls
    }

    pub fn complete_calls(&self) -> usize {
        self.state.lock().complete_calls
    }

    pub fn list_keysets_calls(&self) -> usize {
        self.state.lock().list_keysets_calls
    }

    pub fn last_initiate_request(&self) -> Option<InitiateDelayNotifyRequest> {
        self.state.lock().last_initiate_request.clone()
    }

    pub fn last_complete_request(&self) -> Option<CompleteDelayNotifyRequest> {
        self.state.lock().last_complete_request.clone()
    }
}

fn no_recovery() -> F8eError {
    F8eError::client(F8eClientErrorCode::NoRecoveryExists)
}

#[async_trait]
impl F8eRecoveryService for FakeF8eRecoveryService {
    async fn initiate_delay_notify(
        &self,
        request: InitiateDelayNotifyRequest,
    ) -> Result<ServerRecovery, F8eError> {
        let mut state = self.state.lock();
        state.initiate_calls += 1;
        state.last_initiate_request = Some(request.clone());
        if let Some(err) = state.initiate_error.clone() {
            return Err(err);
        }

        let start_time = Utc::now();
        let delay = chrono::Duration::from_std(request.delay_period)
            .map_err(|err| F8eError::server(err.to_string()))?;
        let recovery = ServerRecovery {
            full_account_id: request.full_account_id,
            start_time,
            end_time: start_time + delay,
            lost_factor: request.lost_factor,
            destination_app_global_auth_pub_key: request.destination_app_global_auth_pub_key,
            destination_app_recovery_auth_pub_key: request.destination_app_recovery_auth_pub_key,
            destination_hardware_auth_pub_key: request.destination_hardware_auth_pub_key,
        };
        state.active_recovery = Some(recovery.clone());
        Ok(recovery)
    }

    async fn cancel_delay_notify(
        &self,
        _full_account_id: &FullAccountId,
        _hw_proof_of_possession: Option<HwFactorProofOfPossession>,
    ) -> Result<(), F8eError> {
        let mut state = self.state.lock();
        state.cancel_calls += 1;
        if let Some(err) = state.cancel_error.clone() {
            return Err(err);
        }
        state.active_recovery.take().map(|_| ()).ok_or_else(no_recovery)
    }

    async fn get_delay_notify_status(
        &self,
        _full_account_id: &FullAccountId,
    ) -> Result<Option<ServerRecovery>, F8eError> {
        let delay = {
            let mut state = self.state.lock();
            state.status_calls += 1;
            state.status_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock();
        match state.status_error.clone() {
            Some(err) => Err(err),
            None => Ok(state.active_recovery.clone()),
        }
    }

    async fn complete_delay_notify(
        &self,
        _full_account_id: &FullAccountId,
        request: CompleteDelayNotifyRequest,
    ) -> Result<(), F8eError> {
        let mut state = self.state.lock();
        state.complete_calls += 1;
        state.last_complete_request = Some(request);
        if let Some(err) = state.complete_error.clone() {
            return Err(err);
        }
        state.active_recovery.take().map(|_| ()).ok_or_else(no_recovery)
    }

    async fn list_keysets(
        &self,
        _full_account_id: &FullAccountId,
    ) -> Result<Vec<SpendingKeyset>, F8eError> {
        let mut state = self.state.lock();
        state.list_keysets_calls += 1;
        match state.list_keysets_error.clone() {
            Some(err) => Err(err),
            None => Ok(state.keysets.clone()),
        }
    }
}

/// Records every batch of watch addresses.
#[derive(Debug, Default)]
pub struct FakeAddressWatchRegistrar {
    registered: Mutex<Vec<(FullAccountId, Vec<WatchAddress>)>>,
    error: Mutex<Option<F8eError>>,
}

impl FakeAddressWatchRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: Option<F8eError>) {
        *self.error.lock() = error;
    }

    /// Batches received so far, including failed ones.
    pub fn registrations(&self) -> Vec<(FullAccountId, Vec<WatchAddress>)> {
        self.registered.lock().clone()
    }

    pub fn registration_calls(&self) -> usize {
        self.registered.lock().len()
    }
}

#[async_trait]
impl AddressWatchRegistrar for FakeAddressWatchRegistrar {
    async fn register_watch_addresses(
        &self,
        full_account_id: &FullAccountId,
        addresses: Vec<WatchAddress>,
    ) -> Result<(), F8eError> {
        self.registered
            .lock()
            .push((full_account_id.clone(), addresses));
        match self.error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
