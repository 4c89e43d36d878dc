use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sitewatch_types::{
    Job, JobStatus, Page, PageRecord, PageSnapshot, Scan, ScanStatus, Site, SiteStatus,
};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::storage::{JobFilter, JobStatusCounts, Storage};

/// In-memory reference adapter.
///
/// Single-node semantics: per-entity `RwLock` maps, with the job-lease CAS
/// done under the jobs write lock. Good for tests and small deployments;
/// anything bigger plugs a real adapter into the same trait.
#[derive(Default)]
pub struct MemoryStorage {
    sites: RwLock<HashMap<Uuid, Site>>,
    /// Keyed by (site id, canonical url).
    pages: RwLock<HashMap<(Uuid, String), Page>>,
    scans: RwLock<HashMap<Uuid, Scan>>,
    /// Keyed by scan id; inner key is page id for per-scan uniqueness.
    snapshots: RwLock<HashMap<Uuid, HashMap<Uuid, PageSnapshot>>>,
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_site(&self, site: Site) -> StorageResult<Uuid> {
        let id = site.id;
        self.sites.write().await.insert(id, site);
        Ok(id)
    }

    async fn get_site(&self, site_id: Uuid) -> StorageResult<Option<Site>> {
        Ok(self.sites.read().await.get(&site_id).cloned())
    }

    async fn update_site(&self, site: Site) -> StorageResult<()> {
        let mut sites = self.sites.write().await;
        if !sites.contains_key(&site.id) {
            return Err(StorageError::SiteNotFound(site.id));
        }
        sites.insert(site.id, site);
        Ok(())
    }

    async fn delete_archived_sites(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let doomed: Vec<Uuid> = {
            let sites = self.sites.read().await;
            sites
                .values()
                .filter(|s| {
                    s.status == SiteStatus::Archived
                        && s.archived_at.map_or(false, |at| at < cutoff)
                })
                .map(|s| s.id)
                .collect()
        };

        for site_id in &doomed {
            // Cascade: site → scans → snapshots, site → pages, site → jobs.
            self.sites.write().await.remove(site_id);

            let scan_ids: Vec<Uuid> = {
                let mut scans = self.scans.write().await;
                let ids: Vec<Uuid> = scans
                    .values()
                    .filter(|s| s.site_id == *site_id)
                    .map(|s| s.id)
                    .collect();
                for id in &ids {
                    scans.remove(id);
                }
                ids
            };
            {
                let mut snapshots = self.snapshots.write().await;
                for scan_id in &scan_ids {
                    snapshots.remove(scan_id);
                }
            }
            self.pages
                .write()
                .await
                .retain(|(owner, _), _| owner != site_id);
            self.jobs.write().await.retain(|_, j| j.site_id != *site_id);
            debug!(site_id = %site_id, "Deleted archived site");
        }

        Ok(doomed.len() as u64)
    }

    async fn upsert_page(&self, site_id: Uuid, record: PageRecord) -> StorageResult<Uuid> {
        let mut pages = self.pages.write().await;
        let key = (site_id, record.url.clone());

        if let Some(existing) = pages.get_mut(&key) {
            existing.status = record.status;
            existing.content_hash = record.content_hash;
            existing.title = record.title;
            existing.meta_description = record.meta_description;
            existing.canonical_url = record.canonical_url;
            existing.response_code = record.response_code;
            existing.load_time_ms = record.load_time_ms;
            existing.last_seen = record.seen_at;
            Ok(existing.id)
        } else {
            let page = Page {
                id: Uuid::new_v4(),
                site_id,
                url: record.url,
                status: record.status,
                content_hash: record.content_hash,
                title: record.title,
                meta_description: record.meta_description,
                canonical_url: record.canonical_url,
                response_code: record.response_code,
                load_time_ms: record.load_time_ms,
                first_seen: record.seen_at,
                last_seen: record.seen_at,
            };
            let id = page.id;
            pages.insert(key, page);
            Ok(id)
        }
    }

    async fn get_page(&self, site_id: Uuid, url: &str) -> StorageResult<Option<Page>> {
        Ok(self
            .pages
            .read()
            .await
            .get(&(site_id, url.to_string()))
            .cloned())
    }

    async fn mark_pages_removed(
        &self,
        site_id: Uuid,
        seen_urls: &[String],
    ) -> StorageResult<u64> {
        let seen: HashSet<&str> = seen_urls.iter().map(String::as_str).collect();
        let mut pages = self.pages.write().await;
        let mut marked = 0;
        for ((owner, url), page) in pages.iter_mut() {
            if *owner == site_id
                && !seen.contains(url.as_str())
                && page.status != sitewatch_types::PageStatus::Removed
            {
                page.status = sitewatch_types::PageStatus::Removed;
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn create_scan(&self, scan: Scan) -> StorageResult<Uuid> {
        let id = scan.id;
        self.scans.write().await.insert(id, scan);
        Ok(id)
    }

    async fn get_scan(&self, scan_id: Uuid) -> StorageResult<Option<Scan>> {
        Ok(self.scans.read().await.get(&scan_id).cloned())
    }

    async fn update_scan(&self, scan: Scan) -> StorageResult<()> {
        let mut scans = self.scans.write().await;
        if !scans.contains_key(&scan.id) {
            return Err(StorageError::ScanNotFound(scan.id));
        }
        scans.insert(scan.id, scan);
        Ok(())
    }

    async fn get_previous_completed_scan(
        &self,
        site_id: Uuid,
        before: DateTime<Utc>,
    ) -> StorageResult<Option<Scan>> {
        let scans = self.scans.read().await;
        Ok(scans
            .values()
            .filter(|s| {
                s.site_id == site_id
                    && s.status == ScanStatus::Completed
                    && s.started_at < before
            })
            .max_by_key(|s| s.started_at)
            .cloned())
    }

    async fn insert_snapshots(&self, snapshots: Vec<PageSnapshot>) -> StorageResult<()> {
        let mut store = self.snapshots.write().await;
        for snapshot in snapshots {
            store
                .entry(snapshot.scan_id)
                .or_default()
                .insert(snapshot.page_id, snapshot);
        }
        Ok(())
    }

    async fn list_snapshots_for_scan(&self, scan_id: Uuid) -> StorageResult<Vec<PageSnapshot>> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(&scan_id)
            .map(|per_page| per_page.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_job(&self, job: Job) -> StorageResult<Uuid> {
        let id = job.id;
        self.jobs.write().await.insert(id, job);
        Ok(id)
    }

    async fn get_job(&self, job_id: Uuid) -> StorageResult<Option<Job>> {
        Ok(self.jobs.read().await.get(&job_id).cloned())
    }

    async fn update_job(&self, job: Job) -> StorageResult<()> {
        let mut jobs = self.jobs.write().await;
        if !jobs.contains_key(&job.id) {
            return Err(StorageError::JobNotFound(job.id));
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn list_queued_jobs(&self, limit: usize) -> StorageResult<Vec<Job>> {
        let now = Utc::now();
        let jobs = self.jobs.read().await;
        let mut ready: Vec<Job> = jobs.values().filter(|j| j.is_ready(now)).cloned().collect();
        ready.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        ready.truncate(limit);
        Ok(ready)
    }

    async fn acquire_job_lease(&self, job_id: Uuid, worker_id: &str) -> StorageResult<bool> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&job_id) else {
            return Err(StorageError::JobNotFound(job_id));
        };
        // CAS under the write lock: only a queued, due job can be claimed.
        if !job.is_ready(Utc::now()) {
            return Ok(false);
        }
        job.start(worker_id);
        Ok(true)
    }

    async fn find_stuck_jobs(&self, started_before: DateTime<Utc>) -> StorageResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Running
                    && j.started_at.map_or(false, |at| at < started_before)
            })
            .cloned()
            .collect())
    }

    async fn delete_old_jobs(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, j| {
            !(j.status.is_terminal() && j.completed_at.map_or(false, |at| at < cutoff))
        });
        Ok((before - jobs.len()) as u64)
    }

    async fn count_jobs_by_status(&self) -> StorageResult<JobStatusCounts> {
        let jobs = self.jobs.read().await;
        let mut counts = JobStatusCounts::default();
        for job in jobs.values() {
            match job.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Failed => counts.failed += 1,
                _ => {}
            }
        }
        Ok(counts)
    }

    async fn list_jobs(&self, filter: JobFilter) -> StorageResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut matched: Vec<Job> = jobs
            .values()
            .filter(|j| filter.status.map_or(true, |s| j.status == s))
            .filter(|j| filter.site_id.map_or(true, |id| j.site_id == id))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if filter.limit > 0 {
            matched.truncate(filter.limit);
        }
        Ok(matched)
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}
