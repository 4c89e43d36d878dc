use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sitewatch_storage::Storage;
use sitewatch_types::ScanStatus;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Retention and timeout windows.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Sweep interval.
    pub interval: Duration,
    /// A running job older than this is failed as stuck.
    pub stuck_job_hours: u32,
    /// Terminal jobs older than this are deleted.
    pub old_job_days: u32,
    /// Archived sites older than this are deleted.
    pub archive_retention_days: u32,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            stuck_job_hours: 2,
            old_job_days: 30,
            archive_retention_days: 30,
        }
    }
}

/// One sweep's tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaperStats {
    pub stuck_jobs_failed: u64,
    pub old_jobs_deleted: u64,
    pub archived_sites_deleted: u64,
}

/// Periodic janitor: times out stuck jobs (and their scans), trims old
/// terminal jobs and enforces archived-site retention.
pub struct Reaper {
    storage: Arc<dyn Storage>,
    config: ReaperConfig,
    running: Arc<AtomicBool>,
}

impl Reaper {
    pub fn new(storage: Arc<dyn Storage>, config: ReaperConfig) -> Self {
        Self {
            storage,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sweep loop; returns when [`stop`](Self::stop) is called.
    pub async fn run(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Reaper is already running");
            return;
        }
        info!(interval_secs = self.config.interval.as_secs(), "Reaper started");

        while self.running.load(Ordering::SeqCst) {
            match self.sweep().await {
                Ok(stats) if stats != ReaperStats::default() => {
                    info!(
                        stuck = stats.stuck_jobs_failed,
                        old_jobs = stats.old_jobs_deleted,
                        archived_sites = stats.archived_sites_deleted,
                        "Reaper sweep"
                    );
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Reaper sweep failed"),
            }
            sleep(self.config.interval).await;
        }

        info!("Reaper stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// One pass; split out so tests can drive it directly.
    pub async fn sweep(&self) -> anyhow::Result<ReaperStats> {
        let mut stats = ReaperStats::default();
        let now = Utc::now();

        // Stuck jobs: no retry, the work already burned its 2 hours.
        let threshold = now - chrono::Duration::hours(i64::from(self.config.stuck_job_hours));
        for mut job in self.storage.find_stuck_jobs(threshold).await? {
            let message = format!("timed out after {} hours", self.config.stuck_job_hours);
            warn!(job_id = %job.id, "Failing stuck job");
            self.fail_linked_scan(&job.metadata, &message).await;
            job.fail(&message);
            self.storage.update_job(job).await?;
            stats.stuck_jobs_failed += 1;
        }

        let job_cutoff = now - chrono::Duration::days(i64::from(self.config.old_job_days));
        stats.old_jobs_deleted = self.storage.delete_old_jobs(job_cutoff).await?;

        let site_cutoff =
            now - chrono::Duration::days(i64::from(self.config.archive_retention_days));
        stats.archived_sites_deleted = self.storage.delete_archived_sites(site_cutoff).await?;

        Ok(stats)
    }

    /// A stuck job's scan row (linked through job metadata) is failed with
    /// the same message so no scan dangles in `running`.
    async fn fail_linked_scan(
        &self,
        metadata: &std::collections::HashMap<String, serde_json::Value>,
        message: &str,
    ) {
        let Some(scan_id) = metadata
            .get("scan_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
        else {
            return;
        };
        match self.storage.get_scan(scan_id).await {
            Ok(Some(mut scan)) if scan.status == ScanStatus::Running => {
                scan.fail(message);
                if let Err(e) = self.storage.update_scan(scan).await {
                    error!(scan_id = %scan_id, error = %e, "Could not fail stuck scan");
                }
            }
            Ok(_) => {}
            Err(e) => error!(scan_id = %scan_id, error = %e, "Could not load stuck scan"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sitewatch_storage::MemoryStorage;
    use sitewatch_types::{Job, JobStatus, JobType, Scan, ScanSettings, Site};

    fn reaper(storage: Arc<MemoryStorage>) -> Reaper {
        Reaper::new(storage, ReaperConfig::default())
    }

    #[tokio::test]
    async fn stuck_job_and_its_scan_are_failed() {
        let storage = Arc::new(MemoryStorage::new());
        let site_id = Uuid::new_v4();

        let scan = Scan::new(site_id, ScanSettings::default());
        let scan_id = scan.id;
        storage.create_scan(scan).await.unwrap();

        let mut job = Job::new(site_id, JobType::Scan);
        job.start("w0");
        job.started_at = Some(Utc::now() - chrono::Duration::hours(3));
        job.metadata
            .insert("scan_id".to_string(), json!(scan_id.to_string()));
        let job_id = job.id;
        storage.create_job(job).await.unwrap();

        let stats = reaper(storage.clone()).sweep().await.unwrap();
        assert_eq!(stats.stuck_jobs_failed, 1);

        let job = storage.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("timed out after 2 hours"));

        let scan = storage.get_scan(scan_id).await.unwrap().unwrap();
        assert_eq!(scan.status, ScanStatus::Failed);
        assert!(scan.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn fresh_running_jobs_survive() {
        let storage = Arc::new(MemoryStorage::new());
        let mut job = Job::new(Uuid::new_v4(), JobType::Scan);
        job.start("w0");
        let job_id = job.id;
        storage.create_job(job).await.unwrap();

        let stats = reaper(storage.clone()).sweep().await.unwrap();
        assert_eq!(stats.stuck_jobs_failed, 0);
        assert_eq!(
            storage.get_job(job_id).await.unwrap().unwrap().status,
            JobStatus::Running
        );
    }

    #[tokio::test]
    async fn retention_windows_enforced() {
        let storage = Arc::new(MemoryStorage::new());

        let mut old_job = Job::new(Uuid::new_v4(), JobType::Scan);
        old_job.start("w0");
        old_job.complete(None);
        old_job.completed_at = Some(Utc::now() - chrono::Duration::days(45));
        storage.create_job(old_job).await.unwrap();

        let mut site = Site::new(Uuid::new_v4(), "Old", "https://old.example/");
        site.archive();
        site.archived_at = Some(Utc::now() - chrono::Duration::days(45));
        storage.create_site(site).await.unwrap();

        let stats = reaper(storage).sweep().await.unwrap();
        assert_eq!(stats.old_jobs_deleted, 1);
        assert_eq!(stats.archived_sites_deleted, 1);
    }
}
