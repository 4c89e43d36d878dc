use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use governor::{Quota, RateLimiter};
use sitewatch_extraction::{extract_page, ExtractedPage};
use sitewatch_fetch::Fetcher;
use sitewatch_spider::glob_matches;
use sitewatch_types::{ExtractionOverride, ExtractionSettings};
use tracing::debug;
use url::Url;

/// Worker-pool sizing and pacing.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Concurrent in-flight fetches.
    pub max_concurrency: usize,
    /// Minimum spacing between fetches across the whole pool, in
    /// milliseconds; 0 disables pacing.
    pub crawl_delay_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 20,
            crawl_delay_ms: 500,
        }
    }
}

/// Per-URL outcome of the fetch+extract stage.
#[derive(Debug, Clone)]
pub struct PageResult {
    pub url: String,
    pub response_code: u16,
    pub load_time_ms: u64,
    /// Empty for error responses.
    pub content_hash: String,
    /// Present for successful HTML responses only.
    pub extracted: Option<ExtractedPage>,
    pub error: Option<String>,
    pub extraction_config_id: String,
}

impl PageResult {
    /// Response code in the extractable range.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.response_code)
    }
}

/// Fans a URL list across bounded concurrent workers, driving the
/// extractor per URL. Pacing is a global token bucket derived from the
/// crawl delay, so the pool as a whole respects the configured spacing.
pub struct PageWorkerPool {
    fetcher: Fetcher,
    config: PoolConfig,
}

impl PageWorkerPool {
    pub fn new(fetcher: Fetcher, config: PoolConfig) -> Self {
        Self { fetcher, config }
    }

    /// Process one URL batch, returning results in input order.
    ///
    /// `overrides` maps URLs to discovery-source extraction overrides
    /// (sitemap entries can carry one); they win over pattern overrides.
    /// `progress` is called with the number of completed URLs after each
    /// finished fetch.
    pub async fn process<F>(
        &self,
        urls: &[String],
        settings: &ExtractionSettings,
        overrides: &HashMap<String, ExtractionOverride>,
        progress: F,
    ) -> Vec<PageResult>
    where
        F: Fn(usize) + Send + Sync,
    {
        let limiter = self.rate_limiter();
        let done = AtomicUsize::new(0);

        stream::iter(urls)
            .map(|url| {
                let limiter = limiter.clone();
                let done = &done;
                let progress = &progress;
                let fut: std::pin::Pin<Box<dyn std::future::Future<Output = PageResult> + Send + '_>> =
                    Box::pin(async move {
                        if let Some(limiter) = limiter {
                            limiter.until_ready().await;
                        }
                        let result = self.process_one(url, settings, overrides.get(url)).await;
                        progress(done.fetch_add(1, Ordering::Relaxed) + 1);
                        result
                    });
                fut
            })
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await
    }

    async fn process_one(
        &self,
        url: &str,
        settings: &ExtractionSettings,
        source_override: Option<&ExtractionOverride>,
    ) -> PageResult {
        let fetched = self.fetcher.fetch(url).await;
        let mut config = settings.config_for(url, glob_matches);
        if let Some(source_override) = source_override {
            source_override.apply_to(&mut config);
        }

        let base = Url::parse(&fetched.url).or_else(|_| Url::parse(url)).ok();
        if let (true, true, Some(base)) = (fetched.is_success(), fetched.is_html(), base) {
            let extracted = extract_page(&fetched.body, &base, &config);
            PageResult {
                url: url.to_string(),
                response_code: fetched.status,
                load_time_ms: fetched.load_time_ms,
                content_hash: fetched.content_hash,
                extracted: Some(extracted),
                error: None,
                extraction_config_id: config.id,
            }
        } else {
            debug!(url = %url, status = fetched.status, "Page fetch not extractable");
            PageResult {
                url: url.to_string(),
                response_code: fetched.status,
                load_time_ms: fetched.load_time_ms,
                content_hash: String::new(),
                extracted: None,
                error: fetched.error,
                extraction_config_id: config.id,
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn rate_limiter(
        &self,
    ) -> Option<
        Arc<
            RateLimiter<
                governor::state::NotKeyed,
                governor::state::InMemoryState,
                governor::clock::DefaultClock,
            >,
        >,
    > {
        if self.config.crawl_delay_ms == 0 {
            return None;
        }
        let per_second = (1000 / self.config.crawl_delay_ms.max(1)).max(1) as u32;
        let quota = Quota::per_second(NonZeroU32::new(per_second)?);
        Some(Arc::new(RateLimiter::direct(quota)))
    }
}
