use super::test_helpers::*;
use super::*;
use crate::error::TaskErrorKind;
use crate::types::{TaskPolicy, TaskStatus};
use std::time::Duration;


const DOWNLOAD_ONLY_KEEP: TaskPolicy = TaskPolicy {
    upload_after_download: false,
    delete_after_complete: false,
};

const DOWNLOAD_ONLY_DELETE: TaskPolicy = TaskPolicy {
    upload_after_download: false,
    delete_after_complete: true,
};

const UPLOAD_KEEP: TaskPolicy = TaskPolicy {
    upload_after_download: true,
    delete_after_complete: false,
};

/// Submit a task, finish its download successfully and run one transition pass
async fn downloaded(harness: &Harness, name: &str, policy: TaskPolicy) -> crate::types::TaskId {
    let url = format!("https://files.example.com/{name}");
    let id = harness
        .scheduler
        .submit_task(&url, name, policy)
        .await
        .unwrap();
    harness.downloader.transfer(&url).succeed();
    harness.scheduler.reconcile_downloads().await;
    id
}

/// Poll `check` against fresh snapshots until it holds or two seconds pass
async fn wait_for_snapshot(scheduler: &Scheduler, check: impl Fn(&StatusSnapshot) -> bool) {
    for _ in 0..200 {
        scheduler.refresh_snapshot().await;
        if check(&scheduler.get_status()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached; last snapshot: {:?}", scheduler.get_status());
}
