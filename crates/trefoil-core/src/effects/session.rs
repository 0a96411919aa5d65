//! Account and app-session effects.

use crate::keyset::FullAccount;
use async_trait::async_trait;
use tokio::sync::watch;

/// Whether the app is visible to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppSessionState {
    Foreground,
    Background,
}

/// Source of the foreground/background signal.
pub trait AppSessionManager: Send + Sync {
    /// Subscribe to session state changes. The receiver starts at the current state.
    fn app_session_state(&self) -> watch::Receiver<AppSessionState>;
}

/// Watch-backed session signal, driven by the platform lifecycle hooks.
#[derive(Debug, Clone)]
pub struct AppSession {
    state_tx: std::sync::Arc<watch::Sender<AppSessionState>>,
}

impl AppSession {
    pub fn new(initial: AppSessionState) -> Self {
        let (state_tx, _state_rx) = watch::channel(initial);
        Self {
            state_tx: std::sync::Arc::new(state_tx),
        }
    }

    pub fn set_state(&self, state: AppSessionState) {
        self.state_tx.send_replace(state);
    }
}

impl AppSessionManager for AppSession {
    fn app_session_state(&self) -> watch::Receiver<AppSessionState> {
        self.state_tx.subscribe()
    }
}

/// Provides the currently signed-in account.
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// The active full account, or `None` when signed out or onboarding.
    async fn active_full_account(&self) -> Option<FullAccount>;
}
