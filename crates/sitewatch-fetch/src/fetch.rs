use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{redirect, Client};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Cap on buffered response bodies.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Redirect hop cap when redirects are followed.
const MAX_REDIRECTS: usize = 5;

/// Fetcher construction settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub follow_redirects: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "WebMonitor-Crawler/1.0".to_string(),
            timeout: Duration::from_secs(30),
            follow_redirects: true,
        }
    }
}

/// Outcome of one GET. Transport errors yield `status == 0` with the
/// error message attached; HTTP-level failures carry their real status.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// Wall clock from request start to body complete.
    pub load_time_ms: u64,
    /// SHA-256 hex of the body for non-error responses; empty otherwise.
    pub content_hash: String,
    pub error: Option<String>,
}

impl FetchResult {
    /// Status in the extractable range.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.starts_with("text/html") || ct.starts_with("application/xhtml"))
            .unwrap_or(false)
    }

    fn transport_error(url: &str, load_time_ms: u64, error: String) -> Self {
        Self {
            url: url.to_string(),
            status: 0,
            content_type: None,
            body: Vec::new(),
            load_time_ms,
            content_hash: String::new(),
            error: Some(error),
        }
    }
}

/// SHA-256 over raw body bytes, hex-encoded. This is the identity of page
/// content for change detection.
pub fn content_hash(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

/// Performs single GET requests with timeout, UA and redirect policy.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let redirect_policy = if config.follow_redirects {
            redirect::Policy::limited(MAX_REDIRECTS)
        } else {
            redirect::Policy::none()
        };

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .gzip(true)
            .redirect(redirect_policy)
            .connect_timeout(Duration::from_secs(10).min(config.timeout))
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, config })
    }

    pub fn user_agent(&self) -> &str {
        &self.config.user_agent
    }

    /// Fetch one URL. Never fails: every outcome is a [`FetchResult`].
    pub async fn fetch(&self, url: &str) -> FetchResult {
        let start = Instant::now();

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(url = %url, error = %e, "Transport error");
                return FetchResult::transport_error(url, elapsed, e.to_string());
            }
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        // The final URL after redirects is what the page identity uses.
        let final_url = response.url().to_string();

        let body = match response.bytes().await {
            Ok(bytes) => {
                let mut body = bytes.to_vec();
                body.truncate(MAX_BODY_BYTES);
                body
            }
            Err(e) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(url = %url, error = %e, "Body read error");
                return FetchResult::transport_error(url, elapsed, e.to_string());
            }
        };

        let load_time_ms = start.elapsed().as_millis() as u64;
        let hash = if (200..400).contains(&status) {
            content_hash(&body)
        } else {
            String::new()
        };

        debug!(
            url = %url,
            status = status,
            bytes = body.len(),
            load_time_ms = load_time_ms,
            "Fetched"
        );

        FetchResult {
            url: final_url,
            status,
            content_type,
            body,
            load_time_ms,
            content_hash: hash,
            error: None,
        }
    }
}
