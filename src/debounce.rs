//! Trailing-edge debouncer
//!
//! Every trigger restarts the quiet window; the action runs once the window
//! elapses with no further trigger. Bursts of selection or filesystem events
//! therefore cost a single refresh.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Default quiet window
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Runs an async action after triggers go quiet for `delay`
pub struct Debouncer {
    tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Spawn the debounce task on the current runtime
    pub fn new<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                let mut bursts = 1usize;
                loop {
                    tokio::select! {
                        msg = rx.recv() => match msg {
                            Some(()) => bursts += 1,
                            // Debouncer dropped: pending run is abandoned
                            None => return,
                        },
                        _ = tokio::time::sleep(delay) => break,
                    }
                }
                trace!("Debounced {} triggers into one run", bursts);
                action().await;
            }
        });
        Self { tx, task }
    }

    /// Request a run; restarts the quiet window
    pub fn trigger(&self) {
        // Only fails after the task is gone, in which case there is nothing to run
        let _ = self.tx.send(());
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
