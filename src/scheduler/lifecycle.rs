//! Startup and shutdown coordination.

use crate::error::Result;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::Scheduler;

/// How long shutdown waits for the loops before aborting them
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl Scheduler {
    /// Spawn the transition, upload and snapshot loops
    ///
    /// Calling this more than once has no effect while the loops are running.
    pub async fn start(&self) {
        let mut handles = self.lifecycle.loop_handles.lock().await;
        if !handles.is_empty() {
            tracing::warn!("Scheduler loops already running");
            return;
        }

        handles.push(self.spawn_transition_loop());
        handles.push(self.spawn_upload_loop());
        handles.push(self.spawn_snapshot_loop());

        tracing::info!(
            refresh_interval_secs = self.config.transport.refresh_interval.as_secs(),
            "Scheduler loops started"
        );
    }

    /// Gracefully shut down the scheduler
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new tasks
    /// 2. Signals the loops to stop
    /// 3. Waits for them (an upload in progress finishes first), aborting any
    ///    still running after 30 seconds
    /// 4. Publishes a final snapshot
    ///
    /// Downloads already in flight are not cancelled.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.lifecycle.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new tasks");

        self.lifecycle.cancel_token.cancel();

        let handles: Vec<_> = self.lifecycle.loop_handles.lock().await.drain(..).collect();
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, futures::future::join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result
                        && e.is_panic()
                    {
                        tracing::error!(error = %e, "Scheduler loop panicked");
                    }
                }
                tracing::info!("All scheduler loops stopped");
            }
            Err(_) => {
                tracing::warn!("Timeout waiting for scheduler loops, aborting");
                for abort in aborts {
                    abort.abort();
                }
            }
        }

        self.refresh_snapshot().await;

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// True until [`shutdown`](Self::shutdown) is called
    pub fn is_accepting(&self) -> bool {
        self.lifecycle.accepting_new.load(Ordering::SeqCst)
    }
}
