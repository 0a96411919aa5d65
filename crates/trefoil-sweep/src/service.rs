//! Sweep Service
//!
//! Publishes whether the active account has funds stranded on inactive
//! keysets, refreshed by a foreground-gated periodic check, and prepares the
//! sweep for the signing flow on demand.

use crate::generator::{SweepGenerator, SweepGeneratorError};
use std::sync::Arc;
use tokio::sync::watch;
use trefoil_core::effects::{AccountProvider, AppSessionManager};
use trefoil_core::{FullAccount, Sweep, SweepConfig, SweepContext, TaskRegistry};

pub struct SweepService {
    generator: Arc<SweepGenerator>,
    accounts: Arc<dyn AccountProvider>,
    session: Arc<dyn AppSessionManager>,
    config: SweepConfig,
    sweep_required_tx: watch::Sender<bool>,
}

impl SweepService {
    pub fn new(
        generator: Arc<SweepGenerator>,
        accounts: Arc<dyn AccountProvider>,
        session: Arc<dyn AppSessionManager>,
        config: SweepConfig,
    ) -> Self {
        let (sweep_required_tx, _sweep_required_rx) = watch::channel(false);
        Self {
            generator,
            accounts,
            session,
            config,
            sweep_required_tx,
        }
    }

    /// Whether the last successful check found something to sweep.
    pub fn sweep_required(&self) -> watch::Receiver<bool> {
        self.sweep_required_tx.subscribe()
    }

    /// Regenerate the sweep for the active account and update the signal.
    ///
    /// Runs as a dry run: no watch registration, no new receive address. A
    /// failed generation keeps the previous signal value.
    pub async fn check_for_sweeps(&self) {
        let Some(account) = self.accounts.active_full_account().await else {
            self.set_sweep_required(false);
            return;
        };

        match self
            .generator
            .generate_sweep(&account, SweepContext::Estimate)
            .await
        {
            Ok(sweep_psbts) => self.set_sweep_required(!sweep_psbts.is_empty()),
            Err(err) => {
                tracing::warn!(
                    account_id = %account.account_id,
                    error = %err,
                    "sweep check failed"
                );
            }
        }
    }

    /// The current sweep for `account`, or `None` when nothing needs sweeping.
    pub async fn prepare_sweep(
        &self,
        account: &FullAccount,
    ) -> Result<Option<Sweep>, SweepGeneratorError> {
        let sweep_psbts = self
            .generator
            .generate_sweep(account, SweepContext::InactiveWallet)
            .await?;
        Ok(Sweep::from_psbts(sweep_psbts))
    }

    /// Clear the signal after the customer has broadcast or dismissed the sweep.
    pub fn mark_sweep_handled(&self) {
        self.set_sweep_required(false);
    }

    /// Spawn the periodic check on `registry` when enabled in config.
    pub fn start_periodic_check(self: &Arc<Self>, registry: &TaskRegistry) {
        if !self.config.periodic_check_enabled {
            tracing::debug!("periodic sweep check disabled");
            return;
        }

        let service = Arc::clone(self);
        registry.spawn_foreground_interval(
            self.session.clone(),
            self.config.check_interval(),
            move || {
                let service = Arc::clone(&service);
                async move { service.check_for_sweeps().await }
            },
        );
    }

    fn set_sweep_required(&self, required: bool) {
        self.sweep_required_tx.send_if_modified(|current| {
            let changed = *current != required;
            *current = required;
            changed
        });
    }
}
