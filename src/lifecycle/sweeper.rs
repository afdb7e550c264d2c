//! Periodic removal of expired ledger entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::observability::metrics;
use crate::security::EdgeFilter;

/// Background task that keeps the rate-limit ledger bounded.
pub struct LedgerSweeper {
    filter: Arc<EdgeFilter>,
    interval: Duration,
}

impl LedgerSweeper {
    pub fn new(filter: Arc<EdgeFilter>, interval: Duration) -> Self {
        Self { filter, interval }
    }

    /// Sweep every interval until shutdown fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        tracing::info!(interval = ?self.interval, "Ledger sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Ledger sweeper stopping");
                    break;
                }
            }
        }
    }

    /// Run a single sweep. Store failures are logged, not propagated.
    pub fn sweep_once(&self) -> usize {
        match self.filter.sweep() {
            Ok(removed) => {
                let remaining = self.filter.ledger().len();
                metrics::record_swept(removed);
                metrics::record_ledger_size(remaining);
                if removed > 0 {
                    tracing::debug!(removed, remaining, "Swept expired ledger entries");
                }
                removed
            }
            Err(e) => {
                tracing::error!(error = %e, "Ledger sweep failed");
                0
            }
        }
    }
}
