use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use sitewatch_config::AppConfig;
use sitewatch_fetch::{FetchConfig, Fetcher};
use sitewatch_spider::{LinkCrawler, SitemapParser};
use sitewatch_storage::{Storage, StorageError};
use sitewatch_types::{
    canonicalize_url, DiscoverySettings, ExtractionOverride, Job, JobStatus, PageRecord,
    PageSnapshot, PageStatus, Scan, ScanCounters, ScanSettings, Site,
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pool::{PageResult, PageWorkerPool, PoolConfig};

/// Pages persisted per batch; cancellation is observed between batches.
const PERSIST_BATCH: usize = 100;

/// Scan execution errors. Permanent errors are never retried by the
/// dispatcher; everything else is eligible for the retry budget.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("site not found: {0}")]
    SiteNotFound(Uuid),

    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Internal(String),
}

impl ScanError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, ScanError::SiteNotFound(_) | ScanError::JobNotFound(_))
    }
}

enum ScanOutcome {
    Completed,
    Cancelled,
}

/// Drives one job of type `scan` end to end.
///
/// Progress bands: discovery ends at 25, fetch+extract+persist walks
/// 25–75, counter computation ends at 95, completion is 100.
pub struct ScanOrchestrator {
    storage: Arc<dyn Storage>,
    config: AppConfig,
}

impl ScanOrchestrator {
    pub fn new(storage: Arc<dyn Storage>, config: AppConfig) -> Self {
        Self { storage, config }
    }

    /// Run the scan for `job`. The job row must already be leased
    /// (running); this method owns its progress and completion updates.
    /// The dispatcher translates an `Err` into failed/retry transitions.
    pub async fn run(&self, job: &Job) -> Result<(), ScanError> {
        let site = self
            .storage
            .get_site(job.site_id)
            .await?
            .ok_or(ScanError::SiteNotFound(job.site_id))?;

        let mut scan = Scan::new(
            site.id,
            ScanSettings {
                discovery: site.discovery.clone(),
                extraction: site.extraction.clone(),
            },
        );
        self.storage.create_scan(scan.clone()).await?;

        // Link the scan to the job so the reaper can fail both together.
        {
            let mut job_row = self
                .storage
                .get_job(job.id)
                .await?
                .ok_or(ScanError::JobNotFound(job.id))?;
            job_row
                .metadata
                .insert("scan_id".to_string(), json!(scan.id.to_string()));
            self.storage.update_job(job_row).await?;
        }

        info!(job_id = %job.id, scan_id = %scan.id, site = %site.name, "Scan started");

        match self.execute(&site, &mut scan, job.id).await {
            Ok(ScanOutcome::Completed) => Ok(()),
            Ok(ScanOutcome::Cancelled) => {
                info!(scan_id = %scan.id, "Scan cancelled");
                Ok(())
            }
            Err(e) => {
                warn!(scan_id = %scan.id, error = %e, "Scan failed");
                scan.fail(e.to_string());
                // Best effort: the original error is the one that matters.
                if let Err(update_err) = self.storage.update_scan(scan).await {
                    warn!(error = %update_err, "Could not persist failed scan state");
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        site: &Site,
        scan: &mut Scan,
        job_id: Uuid,
    ) -> Result<ScanOutcome, ScanError> {
        // Phase 1: discovery.
        let (urls, source_overrides) = self.discover(site).await;
        self.set_progress(job_id, 25).await?;

        let total = urls.len();
        info!(scan_id = %scan.id, urls = total, "Discovery finished");

        // Phase 2+3: fetch, extract and persist in batches.
        let pool = self.build_pool(&scan.settings.discovery)?;
        let mut current: HashMap<String, String> = HashMap::with_capacity(total);
        let mut ordered_urls: Vec<String> = Vec::with_capacity(total);
        let mut error_pages: u32 = 0;
        let mut processed = 0usize;

        for batch in urls.chunks(PERSIST_BATCH) {
            if self.job_cancelled(job_id).await? {
                scan.cancel();
                self.storage.update_scan(scan.clone()).await?;
                return Ok(ScanOutcome::Cancelled);
            }

            let results = pool
                .process(batch, &scan.settings.extraction, &source_overrides, |_| {})
                .await;

            let mut snapshots = Vec::with_capacity(results.len());
            for result in results {
                if !result.is_success() {
                    error_pages += 1;
                }
                for warning in result
                    .extracted
                    .as_ref()
                    .map(|e| e.warnings.as_slice())
                    .unwrap_or_default()
                {
                    if !scan.warnings.contains(warning) {
                        scan.warnings.push(warning.clone());
                    }
                }

                let page_id = self
                    .storage
                    .upsert_page(site.id, page_record(&result))
                    .await?;
                current.insert(result.url.clone(), result.content_hash.clone());
                ordered_urls.push(result.url.clone());
                snapshots.push(snapshot_from(&result, scan.id, page_id));
            }
            self.storage.insert_snapshots(snapshots).await?;

            processed += batch.len();
            let progress = (25 + 50 * processed / total.max(1)) as u8;
            self.set_progress(job_id, progress).await?;
        }
        self.set_progress(job_id, 75).await?;

        // Phase 4: counters against the previous completed scan.
        let previous = self
            .storage
            .get_previous_completed_scan(site.id, scan.started_at)
            .await?;
        let previous_hashes: HashMap<String, String> = match &previous {
            Some(prev) => self
                .storage
                .list_snapshots_for_scan(prev.id)
                .await?
                .into_iter()
                .map(|s| (s.url, s.content_hash))
                .collect(),
            None => HashMap::new(),
        };

        let current_urls: HashSet<&String> = current.keys().collect();
        let counters = ScanCounters {
            total_pages: total as u32,
            new_pages: current
                .keys()
                .filter(|u| !previous_hashes.contains_key(*u))
                .count() as u32,
            removed_pages: previous_hashes
                .keys()
                .filter(|u| !current_urls.contains(u))
                .count() as u32,
            changed_pages: current
                .iter()
                .filter(|(url, hash)| {
                    previous_hashes
                        .get(*url)
                        .map_or(false, |previous| previous != *hash)
                })
                .count() as u32,
            error_pages,
        };
        self.storage
            .mark_pages_removed(site.id, &ordered_urls)
            .await?;
        self.set_progress(job_id, 95).await?;

        // Phase 5: finalize scan, site rollups, job completion.
        if self.job_cancelled(job_id).await? {
            scan.cancel();
            self.storage.update_scan(scan.clone()).await?;
            return Ok(ScanOutcome::Cancelled);
        }

        scan.complete(counters, ordered_urls);
        self.storage.update_scan(scan.clone()).await?;
        self.update_site_rollups(site.id, &counters).await?;
        self.complete_job(job_id, scan, &counters).await?;

        info!(
            scan_id = %scan.id,
            total = counters.total_pages,
            new = counters.new_pages,
            changed = counters.changed_pages,
            removed = counters.removed_pages,
            errors = counters.error_pages,
            "Scan completed"
        );
        Ok(ScanOutcome::Completed)
    }

    /// URL discovery; failures inside either method degrade to an empty
    /// list, which completes the scan with zero pages rather than failing.
    /// Sitemap sources can attach an extraction override to the URLs they
    /// contribute; those come back in the second map.
    async fn discover(
        &self,
        site: &Site,
    ) -> (Vec<String>, HashMap<String, ExtractionOverride>) {
        let raw: Vec<(String, Option<ExtractionOverride>)> = match &site.discovery {
            DiscoverySettings::Sitemap(settings) => {
                let fetcher = match self.build_fetcher(self.config.request_timeout(), true) {
                    Ok(fetcher) => fetcher,
                    Err(e) => {
                        warn!(error = %e, "Could not build sitemap fetcher");
                        return (Vec::new(), HashMap::new());
                    }
                };
                SitemapParser::new(fetcher, settings.clone())
                    .discover_with_overrides(&site.root_url)
                    .await
            }
            DiscoverySettings::Crawling(settings) => {
                let fetcher = match self.build_fetcher(
                    Duration::from_secs(settings.timeout_secs),
                    settings.follow_redirects,
                ) {
                    Ok(fetcher) => fetcher,
                    Err(e) => {
                        warn!(error = %e, "Could not build crawl fetcher");
                        return (Vec::new(), HashMap::new());
                    }
                };
                LinkCrawler::new(fetcher, settings.clone())
                    .crawl(&site.root_url)
                    .await
                    .into_iter()
                    .map(|url| (url, None))
                    .collect()
            }
        };

        // Canonical identity for pages; non-http(s) and unparseable URLs
        // fall out here.
        let mut seen = HashSet::new();
        let mut urls = Vec::with_capacity(raw.len());
        let mut overrides = HashMap::new();
        for (url, override_) in raw {
            let Some(canonical) = canonicalize_url(&url) else {
                continue;
            };
            if !seen.insert(canonical.clone()) {
                continue;
            }
            if let Some(override_) = override_ {
                overrides.insert(canonical.clone(), override_);
            }
            urls.push(canonical);
        }
        (urls, overrides)
    }

    fn build_pool(&self, discovery: &DiscoverySettings) -> Result<PageWorkerPool, ScanError> {
        let (max_concurrency, crawl_delay_ms, timeout, follow_redirects) = match discovery {
            DiscoverySettings::Crawling(c) => (
                c.max_concurrency,
                c.crawl_delay_ms,
                Duration::from_secs(c.timeout_secs),
                c.follow_redirects,
            ),
            DiscoverySettings::Sitemap(_) => (
                self.config.max_concurrency,
                self.config.crawl_delay_ms,
                self.config.request_timeout(),
                true,
            ),
        };

        let fetcher = self.build_fetcher(timeout, follow_redirects)?;
        Ok(PageWorkerPool::new(
            fetcher,
            PoolConfig {
                max_concurrency,
                crawl_delay_ms,
            },
        ))
    }

    fn build_fetcher(
        &self,
        timeout: Duration,
        follow_redirects: bool,
    ) -> Result<Fetcher, ScanError> {
        Fetcher::new(FetchConfig {
            user_agent: self.config.user_agent.clone(),
            timeout,
            follow_redirects,
        })
        .map_err(|e| ScanError::Internal(e.to_string()))
    }

    async fn job_cancelled(&self, job_id: Uuid) -> Result<bool, ScanError> {
        let job = self
            .storage
            .get_job(job_id)
            .await?
            .ok_or(ScanError::JobNotFound(job_id))?;
        Ok(job.status == JobStatus::Cancelled)
    }

    /// Progress writes go through a reload so a concurrent cancellation is
    /// never overwritten.
    async fn set_progress(&self, job_id: Uuid, progress: u8) -> Result<(), ScanError> {
        if let Some(mut job) = self.storage.get_job(job_id).await? {
            if job.status == JobStatus::Running && job.progress < progress.min(99) {
                job.progress = progress.min(99);
                self.storage.update_job(job).await?;
            }
        }
        Ok(())
    }

    async fn update_site_rollups(
        &self,
        site_id: Uuid,
        counters: &ScanCounters,
    ) -> Result<(), ScanError> {
        let Some(mut site) = self.storage.get_site(site_id).await? else {
            // Site deleted mid-scan; nothing left to roll up.
            return Ok(());
        };
        site.counters.total_pages = counters.total_pages;
        site.counters.new_pages = counters.new_pages;
        site.counters.changed_pages = counters.changed_pages;
        site.counters.removed_pages = counters.removed_pages;
        site.last_scan = Some(Utc::now());
        site.next_scan = Some(
            Utc::now() + chrono::Duration::hours(i64::from(site.schedule.scan_interval_hours)),
        );
        site.updated_at = Utc::now();
        self.storage.update_site(site).await?;
        Ok(())
    }

    async fn complete_job(
        &self,
        job_id: Uuid,
        scan: &Scan,
        counters: &ScanCounters,
    ) -> Result<(), ScanError> {
        let Some(mut job) = self.storage.get_job(job_id).await? else {
            return Ok(());
        };
        if job.status != JobStatus::Running {
            return Ok(());
        }
        job.complete(Some(json!({
            "scanId": scan.id.to_string(),
            "totalPages": counters.total_pages,
            "newPages": counters.new_pages,
            "changedPages": counters.changed_pages,
            "removedPages": counters.removed_pages,
            "errorPages": counters.error_pages,
        })));
        self.storage.update_job(job).await?;
        Ok(())
    }
}

fn page_record(result: &PageResult) -> PageRecord {
    let extracted = result.extracted.as_ref();
    PageRecord {
        url: result.url.clone(),
        status: if result.is_success() {
            PageStatus::Active
        } else {
            PageStatus::Error
        },
        content_hash: if result.content_hash.is_empty() {
            None
        } else {
            Some(result.content_hash.clone())
        },
        title: extracted.and_then(|e| e.title.clone()),
        meta_description: extracted.and_then(|e| e.meta_description.clone()),
        canonical_url: extracted.and_then(|e| e.canonical_url.clone()),
        response_code: result.response_code,
        load_time_ms: result.load_time_ms,
        seen_at: Utc::now(),
    }
}

fn snapshot_from(result: &PageResult, scan_id: Uuid, page_id: Uuid) -> PageSnapshot {
    let mut snapshot = PageSnapshot::empty(scan_id, result.url.clone());
    snapshot.page_id = page_id;
    snapshot.response_code = result.response_code;
    snapshot.load_time_ms = result.load_time_ms;
    snapshot.content_hash = result.content_hash.clone();
    snapshot.extraction_config_id = result.extraction_config_id.clone();
    if let Some(extracted) = &result.extracted {
        snapshot.title = extracted.title.clone();
        snapshot.meta_description = extracted.meta_description.clone();
        snapshot.canonical_url = extracted.canonical_url.clone();
        snapshot.meta_keywords = extracted.meta_keywords.clone();
        snapshot.breadcrumbs = extracted.breadcrumbs.clone();
        snapshot.headings = extracted.headings.clone();
        snapshot.open_graph = extracted.open_graph.clone();
        snapshot.custom_data = extracted.custom_data.clone();
        snapshot.main_content = extracted.main_content.clone();
    }
    snapshot
}

#[allow(dead_code)]
fn _assert_send() {
    fn assert_send<T: Send>(_: T) {}
    fn check<'a>(o: &'a ScanOrchestrator, job: &'a sitewatch_types::Job) {
        assert_send(o.run(job));
    }
    let _ = check;
}
