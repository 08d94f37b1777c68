//! Status snapshot publishing.

use crate::task::Task;
use crate::types::StatusSnapshot;
use std::sync::Arc;

use super::Scheduler;

impl Scheduler {
    /// Spawn the loop that republishes the status snapshot every refresh interval
    pub(crate) fn spawn_snapshot_loop(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        let cancel_token = self.lifecycle.cancel_token.clone();
        let refresh = self.config.transport.refresh_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(refresh);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        scheduler.refresh_snapshot().await;
                    }
                    _ = cancel_token.cancelled() => {
                        tracing::debug!("Snapshot loop stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Render the collections and publish them as the current snapshot
    pub(crate) async fn refresh_snapshot(&self) {
        let snapshot = {
            let collections = self.collections.lock().await;
            StatusSnapshot {
                downloads: collections
                    .downloads
                    .iter()
                    .map(|pending| pending.task.transfer_record_with(&pending.handle.progress()))
                    .collect(),
                uploads: collections.uploads.iter().map(Task::transfer_record).collect(),
                failed: collections.failed.iter().map(Task::failed_record).collect(),
            }
        };

        tracing::debug!(
            downloads = snapshot.downloads.len(),
            uploads = snapshot.uploads.len(),
            failed = snapshot.failed.len(),
            "Status snapshot refreshed"
        );
        self.status_tx.send_replace(Arc::new(snapshot));
    }

    /// Latest status snapshot
    ///
    /// Never blocks on the live collections. The three record lists always come
    /// from the same refresh and lag the live state by at most one refresh interval.
    pub fn get_status(&self) -> Arc<StatusSnapshot> {
        self.status_tx.borrow().clone()
    }

    /// Receiver that is notified whenever a new snapshot is published
    pub fn subscribe_status(&self) -> tokio::sync::watch::Receiver<Arc<StatusSnapshot>> {
        self.status_tx.subscribe()
    }
}
