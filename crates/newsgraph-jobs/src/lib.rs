use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// spec.md §4.11: `state ∈ {pending, processing, completed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl JobRecord {
    fn new(job_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            state: JobState::Pending,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(Uuid),
}

/// Process-local registry of long-running item-processing jobs
/// (spec.md §4.11). A single `RwLock`-guarded map, not a distributed store —
/// jobs do not survive a process restart.
pub struct JobTracker {
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
    retention: Duration,
    max_entries: usize,
}

impl JobTracker {
    pub fn new(retention: Duration, max_entries: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            retention,
            max_entries,
        }
    }

    /// Registers a new job in `pending` state, evicting the oldest entry
    /// first if the tracker is already at `max_entries` (spec.md §4.11:
    /// "bounded maximum entries ... with oldest-first eviction when full").
    pub async fn create(&self) -> Uuid {
        let job_id = Uuid::new_v4();
        let mut jobs = self.jobs.write().await;

        if jobs.len() >= self.max_entries {
            if let Some(oldest) = jobs
                .values()
                .min_by_key(|job| job.created_at)
                .map(|job| job.job_id)
            {
                jobs.remove(&oldest);
                warn!(evicted_job_id = %oldest, "job tracker at capacity, evicted oldest entry");
            }
        }

        jobs.insert(job_id, JobRecord::new(job_id));
        gauge!("job_tracker_size").set(jobs.len() as f64);
        counter!("jobs_created").increment(1);
        info!(job_id = %job_id, "job created");
        job_id
    }

    pub async fn update_state(
        &self,
        job_id: Uuid,
        state: JobState,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<(), JobError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&job_id).ok_or(JobError::NotFound(job_id))?;
        job.state = state;
        job.updated_at = Utc::now();
        if result.is_some() {
            job.result = result;
        }
        if error.is_some() {
            job.error = error;
        }
        counter!("jobs_state_transitions").increment(1);
        Ok(())
    }

    pub async fn get(&self, job_id: Uuid) -> Option<JobRecord> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    pub async fn delete(&self, job_id: Uuid) -> Result<(), JobError> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(&job_id).ok_or(JobError::NotFound(job_id))?;
        Ok(())
    }

    async fn sweep(&self) {
        let cutoff = Utc::now() - chrono::Duration::from_std(self.retention).unwrap_or_default();
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.updated_at > cutoff);
        let evicted = before - jobs.len();
        if evicted > 0 {
            info!(evicted, "job tracker sweep evicted expired entries");
        }
        gauge!("job_tracker_size").set(jobs.len() as f64);
    }

    /// Spawns the background sweep loop at `interval` (spec.md §4.11 default:
    /// every 5 minutes, see [`Self::spawn_sweeper`]). Exposed separately so
    /// tests can use a short interval without waiting on the real default.
    /// The returned handle is owned by the caller so it can be aborted on
    /// shutdown.
    pub fn spawn_sweeper_with_interval(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                tracker.sweep().await;
            }
        })
    }

    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        self.spawn_sweeper_with_interval(Duration::from_secs(5 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_starts_in_pending_state() {
        let tracker = JobTracker::new(Duration::from_secs(3600), 100);
        let job_id = tracker.create().await;
        let record = tracker.get(job_id).await.unwrap();
        assert_eq!(record.state, JobState::Pending);
    }

    #[tokio::test]
    async fn update_state_transitions_through_lifecycle() {
        let tracker = JobTracker::new(Duration::from_secs(3600), 100);
        let job_id = tracker.create().await;

        tracker
            .update_state(job_id, JobState::Processing, None, None)
            .await
            .unwrap();
        assert_eq!(tracker.get(job_id).await.unwrap().state, JobState::Processing);

        tracker
            .update_state(job_id, JobState::Completed, Some(serde_json::json!({"ok": true})), None)
            .await
            .unwrap();
        let record = tracker.get(job_id).await.unwrap();
        assert_eq!(record.state, JobState::Completed);
        assert_eq!(record.result, Some(serde_json::json!({"ok": true})));
    }

    #[tokio::test]
    async fn update_state_on_unknown_job_fails() {
        let tracker = JobTracker::new(Duration::from_secs(3600), 100);
        let result = tracker
            .update_state(Uuid::new_v4(), JobState::Processing, None, None)
            .await;
        assert!(matches!(result, Err(JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_removes_the_entry() {
        let tracker = JobTracker::new(Duration::from_secs(3600), 100);
        let job_id = tracker.create().await;
        tracker.delete(job_id).await.unwrap();
        assert!(tracker.get(job_id).await.is_none());
    }

    #[tokio::test]
    async fn capacity_eviction_drops_the_oldest_job_first() {
        let tracker = JobTracker::new(Duration::from_secs(3600), 2);
        let first = tracker.create().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let _second = tracker.create().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let third = tracker.create().await;

        assert!(tracker.get(first).await.is_none());
        assert!(tracker.get(third).await.is_some());
    }

    #[tokio::test]
    async fn sweep_evicts_entries_older_than_retention() {
        let tracker = Arc::new(JobTracker::new(Duration::from_millis(10), 100));
        let job_id = tracker.create().await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        tracker.sweep().await;
        assert!(tracker.get(job_id).await.is_none());
    }
}
