use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of work the dispatcher executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Full discovery + fetch + extract + persist pass over a site.
    Scan,
    Discovery,
    Extraction,
    Comparison,
    Cleanup,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Scan => "scan",
            JobType::Discovery => "discovery",
            JobType::Extraction => "extraction",
            JobType::Comparison => "comparison",
            JobType::Cleanup => "cleanup",
        }
    }
}

/// Job status. Transitions are restricted to:
///
/// ```text
/// queued ──lease──▶ running ──success──▶ completed
///                      │
///                      ├── error, retry_count < max ──▶ queued (retry_count + 1)
///                      ├── error, retry_count = max ──▶ failed
///                      ├── cancel ──▶ cancelled
///                      └── lease expired ──▶ failed (reaper)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

/// A scheduled or in-flight unit of work.
///
/// Invariants kept by the lifecycle methods:
/// - `started_at` is set iff status is not `Queued`
/// - `completed_at` is set iff status is terminal
/// - `progress == 100` iff status is `Completed`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub site_id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    /// Higher runs first.
    pub priority: i32,
    /// 0..=100.
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    /// Earliest allowed start; `None` means immediately.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Discovery method, settings and budget hints for the worker.
    pub metadata: HashMap<String, serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Dispatcher instance holding the lease.
    pub worker_id: Option<String>,
}

impl Job {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    pub fn new(site_id: Uuid, job_type: JobType) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_id,
            job_type,
            status: JobStatus::Queued,
            priority: 0,
            progress: 0,
            created_at: Utc::now(),
            scheduled_for: None,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            metadata: HashMap::new(),
            result: None,
            error: None,
            worker_id: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn scheduled(mut self, scheduled_for: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(scheduled_for);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Whether the dispatcher may lease this job now.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Queued && self.scheduled_for.map_or(true, |at| at <= now)
    }

    /// Queued → Running, recording the lease holder.
    pub fn start(&mut self, worker_id: impl Into<String>) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        self.worker_id = Some(worker_id.into());
    }

    /// Running → Completed.
    pub fn complete(&mut self, result: Option<serde_json::Value>) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.progress = 100;
        self.result = result;
    }

    /// Running → Failed. The dispatcher alone decides whether to requeue.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
        // A failed job never reports full progress.
        self.progress = self.progress.min(99);
    }

    /// Failed → Queued for another attempt; counters and lease reset.
    pub fn requeue(&mut self) {
        self.status = JobStatus::Queued;
        self.retry_count += 1;
        self.started_at = None;
        self.completed_at = None;
        self.progress = 0;
        self.worker_id = None;
    }

    /// Queued/Running → Cancelled.
    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        // A job cancelled before it ever ran still gets its terminal stamp.
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.completed_at = Some(Utc::now());
        self.progress = self.progress.min(99);
    }

    pub fn can_retry(&self) -> bool {
        self.status == JobStatus::Failed && self.retry_count < self.max_retries
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(done)) => Some((done - started).num_milliseconds()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_job() -> Job {
        Job::new(Uuid::new_v4(), JobType::Scan)
    }

    #[test]
    fn new_job_is_queued_and_ready() {
        let job = scan_job();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert!(job.is_ready(Utc::now()));
        assert!(job.started_at.is_none());
    }

    #[test]
    fn scheduled_job_not_ready_before_its_time() {
        let job = scan_job().scheduled(Utc::now() + chrono::Duration::hours(1));
        assert!(!job.is_ready(Utc::now()));
        assert!(job.is_ready(Utc::now() + chrono::Duration::hours(2)));
    }

    #[test]
    fn complete_sets_full_progress() {
        let mut job = scan_job();
        job.start("dispatcher-0");
        job.complete(None);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
        assert!(job.duration_ms().is_some());
    }

    #[test]
    fn failed_job_never_reports_full_progress() {
        let mut job = scan_job();
        job.start("dispatcher-0");
        job.progress = 100;
        job.fail("persistence error");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 99);
        assert_eq!(job.error.as_deref(), Some("persistence error"));
    }

    #[test]
    fn requeue_resets_lease_state() {
        let mut job = scan_job();
        job.start("dispatcher-0");
        job.fail("boom");
        assert!(job.can_retry());

        job.requeue();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.retry_count, 1);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert_eq!(job.progress, 0);
        assert!(job.worker_id.is_none());
    }

    #[test]
    fn retries_exhaust_at_max() {
        let mut job = scan_job();
        for _ in 0..Job::DEFAULT_MAX_RETRIES {
            job.start("dispatcher-0");
            job.fail("boom");
            if job.can_retry() {
                job.requeue();
            }
        }
        assert_eq!(job.retry_count, Job::DEFAULT_MAX_RETRIES);
        job.start("dispatcher-0");
        job.fail("boom");
        assert!(!job.can_retry());
    }

    #[test]
    fn cancel_is_terminal() {
        let mut job = scan_job();
        job.cancel();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.status.is_terminal());
        assert!(job.completed_at.is_some());
        assert!(job.started_at.is_some());
    }
}
