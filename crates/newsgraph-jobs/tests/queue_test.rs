use std::sync::Arc;
use std::time::Duration;

use newsgraph_jobs::{JobState, JobTracker};

#[tokio::test]
async fn background_sweeper_purges_expired_jobs_within_one_interval() {
    let tracker = Arc::new(JobTracker::new(Duration::from_millis(50), 100));
    let job_id = tracker.create().await;
    tracker
        .update_state(job_id, JobState::Completed, Some(serde_json::json!({"ok": true})), None)
        .await
        .unwrap();

    let handle = tracker.spawn_sweeper_with_interval(Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.abort();

    assert!(tracker.get(job_id).await.is_none());
}
