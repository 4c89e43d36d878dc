use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitewatch_storage::Storage;
use sitewatch_types::{Job, JobType};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::orchestrator::ScanOrchestrator;

/// Dispatcher tuning.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Queue poll interval.
    pub poll_interval: Duration,
    /// Concurrent scans per dispatcher instance.
    pub max_concurrent: usize,
    /// Queued jobs examined per poll.
    pub batch_size: usize,
    /// Lease-holder identity written on claimed jobs.
    pub worker_id: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_concurrent: 3,
            batch_size: 10,
            worker_id: format!("dispatcher-{}", Uuid::new_v4()),
        }
    }
}

/// Payload delivered by an external queue; the worker acquires the lease
/// idempotently and proceeds exactly as with a polled job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    pub job_id: Uuid,
    pub site_id: Uuid,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub metadata: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl JobMessage {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            site_id: job.site_id,
            job_type: job.job_type,
            metadata: job.metadata.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Polls queued jobs, claims them through the storage lease CAS and hands
/// them to the orchestrator. The dispatcher is the single writer of
/// failed/requeue transitions, so retry policy lives in exactly one place.
pub struct JobDispatcher {
    storage: Arc<dyn Storage>,
    orchestrator: Arc<ScanOrchestrator>,
    config: DispatcherConfig,
    running: Arc<AtomicBool>,
    slots: Arc<Semaphore>,
    /// Sites with a scan in flight; guarantees at most one running scan
    /// per site on this instance.
    active_sites: Arc<tokio::sync::Mutex<HashSet<Uuid>>>,
}

impl JobDispatcher {
    pub fn new(
        storage: Arc<dyn Storage>,
        orchestrator: Arc<ScanOrchestrator>,
        config: DispatcherConfig,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            storage,
            orchestrator,
            config,
            running: Arc::new(AtomicBool::new(false)),
            slots,
            active_sites: Arc::new(tokio::sync::Mutex::new(HashSet::new())),
        }
    }

    /// Poll loop; returns when [`stop`](Self::stop) is called.
    pub async fn run(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Dispatcher is already running");
            return;
        }
        info!(worker_id = %self.config.worker_id, "Dispatcher started");

        while self.running.load(Ordering::SeqCst) {
            match self.poll_once().await {
                Ok(dispatched) => {
                    if dispatched > 0 {
                        debug!(dispatched = dispatched, "Dispatched jobs");
                    }
                }
                Err(e) => error!(error = %e, "Dispatcher poll failed"),
            }
            sleep(self.config.poll_interval).await;
        }

        info!("Dispatcher stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// One poll pass: lease as many due jobs as free slots allow.
    pub async fn poll_once(self: &Arc<Self>) -> anyhow::Result<usize> {
        let mut dispatched = 0;
        let queued = self.storage.list_queued_jobs(self.config.batch_size).await?;

        for job in queued {
            if self.active_sites.lock().await.contains(&job.site_id) {
                // One running scan per site; the next poll retries.
                continue;
            }
            let Ok(permit) = self.slots.clone().try_acquire_owned() else {
                // Concurrency cap reached; the rest waits for a later poll.
                break;
            };
            if !self
                .storage
                .acquire_job_lease(job.id, &self.config.worker_id)
                .await?
            {
                // Someone else won the CAS, or the job left the queue.
                continue;
            }

            let leased = self
                .storage
                .get_job(job.id)
                .await?
                .unwrap_or(job);
            let site_id = leased.site_id;
            self.active_sites.lock().await.insert(site_id);
            dispatched += 1;

            let dispatcher = self.clone();
            tokio::spawn(async move {
                Box::pin(dispatcher.execute(leased)).await;
                dispatcher.active_sites.lock().await.remove(&site_id);
                drop(permit);
            });
        }

        Ok(dispatched)
    }

    /// Handle an externally delivered job message: idempotent lease, then
    /// the normal execution path.
    pub async fn handle_message(self: &Arc<Self>, message: JobMessage) -> anyhow::Result<bool> {
        if self.active_sites.lock().await.contains(&message.site_id) {
            debug!(site_id = %message.site_id, "Site already has a running scan");
            return Ok(false);
        }
        if !self
            .storage
            .acquire_job_lease(message.job_id, &self.config.worker_id)
            .await?
        {
            debug!(job_id = %message.job_id, "Message for already-claimed job ignored");
            return Ok(false);
        }
        let Some(job) = self.storage.get_job(message.job_id).await? else {
            return Ok(false);
        };
        let site_id = job.site_id;
        self.active_sites.lock().await.insert(site_id);
        self.execute(job).await;
        self.active_sites.lock().await.remove(&site_id);
        Ok(true)
    }

    async fn execute(&self, job: Job) {
        info!(job_id = %job.id, job_type = job.job_type.as_str(), "Executing job");

        let run_fut: std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<(), crate::orchestrator::ScanError>> + Send + '_>,
        > = Box::pin(self.orchestrator.run(&job));
        match run_fut.await {
            Ok(()) => {
                // Completion (or cancellation) is already persisted by the
                // orchestrator.
            }
            Err(e) => {
                let permanent = e.is_permanent();
                let message = e.to_string();
                let fail_fut: std::pin::Pin<
                    Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send + '_>,
                > = Box::pin(self.fail_job(job.id, &message, permanent));
                if let Err(transition_err) = fail_fut.await {
                    error!(
                        job_id = %job.id,
                        error = %transition_err,
                        "Could not persist job failure"
                    );
                }
            }
        }
    }

    /// Failure transition, plus requeue when the retry budget allows it.
    async fn fail_job(
        &self,
        job_id: Uuid,
        message: &str,
        permanent: bool,
    ) -> anyhow::Result<()> {
        let Some(mut job) = self.storage.get_job(job_id).await? else {
            return Ok(());
        };
        if job.status.is_terminal() {
            // A concurrent cancel already finalized the row.
            return Ok(());
        }

        job.fail(message);
        self.storage.update_job(job.clone()).await?;

        if !permanent && job.can_retry() {
            job.requeue();
            self.storage.update_job(job.clone()).await?;
            info!(
                job_id = %job_id,
                retry_count = job.retry_count,
                max_retries = job.max_retries,
                "Job requeued after failure"
            );
        } else {
            warn!(job_id = %job_id, error = %message, "Job failed terminally");
        }
        Ok(())
    }
}
