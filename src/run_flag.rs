//! Process-wide run flag.
//!
//! Cleared once on shutdown (or when the startup probe fails). Feed workers
//! check it at the top of every iteration and every sleep they take goes
//! through [`RunFlag::sleep`], so shutdown latency is bounded by how quickly
//! the flag change wakes the sleeper rather than by the sleep's length.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct RunFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl RunFlag {
    /// A new flag in the running state.
    pub fn new() -> Self {
        // ---
        let (tx, _rx) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_running(&self) -> bool {
        *self.tx.borrow()
    }

    /// Clear the flag. Idempotent; wakes every pending [`RunFlag::sleep`].
    pub fn stop(&self) {
        // ---
        let was_running = self.tx.send_replace(false);
        if was_running {
            tracing::info!("Run flag cleared, background work is stopping");
        }
    }

    /// Sleep for `duration` unless the flag is cleared first.
    ///
    /// Returns `true` if the full duration elapsed with the flag still set.
    pub async fn sleep(&self, duration: Duration) -> bool {
        // ---
        let mut rx = self.tx.subscribe();
        if !*rx.borrow_and_update() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_running(),
            _ = rx.wait_for(|running| !*running) => false,
        }
    }

    /// Resolve once the flag has been cleared.
    pub async fn stopped(&self) {
        // ---
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|running| !*running).await;
    }
}
