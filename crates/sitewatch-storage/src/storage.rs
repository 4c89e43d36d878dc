use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitewatch_types::{Job, JobStatus, Page, PageRecord, PageSnapshot, Scan, Site};
use uuid::Uuid;

use crate::error::StorageResult;

/// Filter for job listings; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub site_id: Option<Uuid>,
    pub limit: usize,
}

/// Queue-depth rollup used by the stats endpoint and backpressure checks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobStatusCounts {
    pub queued: usize,
    pub running: usize,
    pub failed: usize,
}

/// The persistence operations the core consumes.
///
/// A scan's writes either all land or the scan is retried; adapters keep
/// writes serialized per scan and per (site id, url).
#[async_trait]
pub trait Storage: Send + Sync {
    // Sites

    async fn create_site(&self, site: Site) -> StorageResult<Uuid>;
    async fn get_site(&self, site_id: Uuid) -> StorageResult<Option<Site>>;
    async fn update_site(&self, site: Site) -> StorageResult<()>;
    /// Cascade-delete archived sites whose `archived_at` is older than the
    /// cutoff. Returns the number of sites removed.
    async fn delete_archived_sites(&self, cutoff: DateTime<Utc>) -> StorageResult<u64>;

    // Pages

    /// Insert or update a page keyed on (site id, url). Fields overwrite,
    /// `first_seen` is preserved. Returns the page id.
    async fn upsert_page(&self, site_id: Uuid, record: PageRecord) -> StorageResult<Uuid>;
    async fn get_page(&self, site_id: Uuid, url: &str) -> StorageResult<Option<Page>>;
    /// Flag pages absent from a completed scan's URL set as removed.
    async fn mark_pages_removed(
        &self,
        site_id: Uuid,
        seen_urls: &[String],
    ) -> StorageResult<u64>;

    // Scans and snapshots

    async fn create_scan(&self, scan: Scan) -> StorageResult<Uuid>;
    async fn get_scan(&self, scan_id: Uuid) -> StorageResult<Option<Scan>>;
    async fn update_scan(&self, scan: Scan) -> StorageResult<()>;
    /// The most recent completed scan for the site started before
    /// `before`; the orchestrator diffs against it for counters.
    async fn get_previous_completed_scan(
        &self,
        site_id: Uuid,
        before: DateTime<Utc>,
    ) -> StorageResult<Option<Scan>>;
    /// Bulk-insert snapshots; no deduplication across scans.
    async fn insert_snapshots(&self, snapshots: Vec<PageSnapshot>) -> StorageResult<()>;
    async fn list_snapshots_for_scan(&self, scan_id: Uuid) -> StorageResult<Vec<PageSnapshot>>;

    // Jobs

    async fn create_job(&self, job: Job) -> StorageResult<Uuid>;
    async fn get_job(&self, job_id: Uuid) -> StorageResult<Option<Job>>;
    async fn update_job(&self, job: Job) -> StorageResult<()>;
    /// Queued jobs whose `scheduled_for` has passed (or is unset), ordered
    /// by priority descending then creation time ascending.
    async fn list_queued_jobs(&self, limit: usize) -> StorageResult<Vec<Job>>;
    /// CAS a job from queued to running with `started_at = now`. Returns
    /// false when the job was already claimed or is no longer queued.
    async fn acquire_job_lease(&self, job_id: Uuid, worker_id: &str) -> StorageResult<bool>;
    /// Running jobs whose `started_at` predates the threshold.
    async fn find_stuck_jobs(&self, started_before: DateTime<Utc>) -> StorageResult<Vec<Job>>;
    /// Delete terminal jobs completed before the cutoff.
    async fn delete_old_jobs(&self, cutoff: DateTime<Utc>) -> StorageResult<u64>;
    async fn count_jobs_by_status(&self) -> StorageResult<JobStatusCounts>;
    async fn list_jobs(&self, filter: JobFilter) -> StorageResult<Vec<Job>>;

    /// Cheap liveness probe for the health endpoint.
    async fn ping(&self) -> StorageResult<()>;
}
