//! Connection Janitor
//!
//! Background task that periodically closes connections to peers that have
//! left the membership. Removing a peer from the getters happens immediately
//! on `set_peers`; closing its channel waits for the next sweep, which absorbs
//! membership flapping without reconnect churn.
//!
//! The task holds only a weak reference to the pool and stops when the pool is
//! dropped, when [`Janitor::shutdown`] is called, or when the handle is dropped.

use super::service::PeerPool;

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a running janitor task.
pub struct Janitor {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Janitor {
    pub fn spawn(pool: &Arc<PeerPool>, interval: Duration) -> Self {
        let pool = Arc::downgrade(pool);
        let (shutdown, rx) = watch::channel(false);

        tracing::info!(interval_ms = interval.as_millis() as u64, "starting connection janitor");
        let handle = tokio::spawn(run(pool, interval, rx));

        Self { shutdown, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signals the task to stop and waits for it to exit.
    pub async fn shutdown(self) {
        // A send error means the task already exited and dropped its receiver.
        let _ = self.shutdown.send(true);

        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "connection janitor ended abnormally");
        }
    }
}

async fn run(pool: Weak<PeerPool>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; sweeps start one interval in.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let Some(pool) = pool.upgrade() else {
            tracing::debug!("peer pool dropped, stopping janitor");
            break;
        };

        let evicted = pool.sweep_connections().await;
        if !evicted.is_empty() {
            tracing::info!(evicted = ?evicted, "janitor closed unused peer connections");
        }
    }

    tracing::info!("connection janitor stopped");
}
