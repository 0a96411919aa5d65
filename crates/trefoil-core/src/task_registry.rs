//! Task registry for long-lived background loops.
//!
//! Loops are scoped to the registry: `shutdown()` (or dropping the registry)
//! cancels every spawned task at its next suspension point.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::Mutex` for JoinHandle storage because the lock is never
//! held across `.await` points.

use crate::effects::session::{AppSessionManager, AppSessionState};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct TaskRegistry {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Run `f` every `interval`, but only while the app is foregrounded.
    ///
    /// While backgrounded the loop parks on the session signal and issues no
    /// work; it runs `f` immediately on the next foreground transition.
    pub fn spawn_foreground_interval<F, Fut>(
        &self,
        session: Arc<dyn AppSessionManager>,
        interval: Duration,
        mut f: F,
    ) where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut state_rx = session.app_session_state();
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    foreground = state_rx.wait_for(|state| *state == AppSessionState::Foreground) => {
                        if foreground.is_err() {
                            break;
                        }
                    }
                }

                f().await;

                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });
        self.handles.lock().push(handle);
    }

    /// Whether `shutdown()` has been called.
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::session::AppSession;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_loop(
        registry: &TaskRegistry,
        session: &AppSession,
        interval: Duration,
    ) -> Arc<AtomicUsize> {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        registry.spawn_foreground_interval(Arc::new(session.clone()), interval, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        runs
    }

    #[tokio::test(start_paused = true)]
    async fn interval_runs_while_foregrounded() {
        let registry = TaskRegistry::new();
        let session = AppSession::new(AppSessionState::Foreground);
        let runs = counting_loop(&registry, &session, Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_pauses_while_backgrounded() {
        let registry = TaskRegistry::new();
        let session = AppSession::new(AppSessionState::Background);
        let runs = counting_loop(&registry, &session, Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        session.set_state(AppSessionState::Foreground);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_loops() {
        let registry = TaskRegistry::new();
        let session = AppSession::new(AppSessionState::Foreground);
        let runs = counting_loop(&registry, &session, Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(1)).await;
        registry.shutdown();
        assert!(registry.is_shut_down());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
