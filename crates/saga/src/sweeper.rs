//! Background task that periodically retries failed compensations.

use std::sync::Arc;
use std::time::Duration;

use ledger::TransactionStore;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::coordinator::CheckoutSaga;

/// Starts the retry sweep as an explicit background task.
///
/// Nothing runs until [`CompensationSweeper::spawn`] is called; the host
/// stops it again through the returned [`SweeperHandle`].
pub struct CompensationSweeper;

impl CompensationSweeper {
    /// Spawns a task that calls `retry_failed_compensations` every `interval`.
    ///
    /// The first sweep runs one full interval after spawning.
    pub fn spawn<S>(saga: Arc<CheckoutSaga<S>>, interval: Duration) -> SweeperHandle
    where
        S: TransactionStore + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_sweep_loop(
            saga,
            interval.max(Duration::from_millis(1)),
            shutdown_rx,
        ));
        SweeperHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running sweeper.
pub struct SweeperHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the sweeper, waiting for an in-progress sweep to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "compensation sweeper task failed");
        }
    }

    /// Returns true if the sweeper task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run_sweep_loop<S: TransactionStore>(
    saga: Arc<CheckoutSaga<S>>,
    interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately.
    timer.tick().await;
    tracing::info!(interval_ms = interval.as_millis() as u64, "compensation sweeper started");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = timer.tick() => {
                if let Err(e) = saga.retry_failed_compensations().await {
                    tracing::error!(error = %e, "compensation sweep failed");
                }
            }
        }
    }

    tracing::info!("compensation sweeper stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SagaConfig;
    use crate::services::CheckoutServices;
    use ledger::InMemoryTransactionStore;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_shutdown() {
        let (services, _handles) = CheckoutServices::in_memory();
        let saga = Arc::new(CheckoutSaga::new(
            InMemoryTransactionStore::new(),
            services,
            SagaConfig::default(),
        ));

        let handle = CompensationSweeper::spawn(saga, Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(130)).await;
        assert!(!handle.is_finished());

        handle.shutdown().await;
    }
}
