use serde::{Deserialize, Serialize};

use crate::extraction::ExtractionOverride;

/// How a site's URL set is enumerated at the start of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMethod {
    Sitemap,
    Crawling,
}

impl DiscoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryMethod::Sitemap => "sitemap",
            DiscoveryMethod::Crawling => "crawling",
        }
    }
}

/// Per-site discovery configuration.
///
/// A site is either enumerated from its XML sitemaps or crawled
/// breadth-first from the root URL; the two carry disjoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum DiscoverySettings {
    Sitemap(SitemapSettings),
    Crawling(CrawlSettings),
}

impl DiscoverySettings {
    pub fn method(&self) -> DiscoveryMethod {
        match self {
            DiscoverySettings::Sitemap(_) => DiscoveryMethod::Sitemap,
            DiscoverySettings::Crawling(_) => DiscoveryMethod::Crawling,
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        DiscoverySettings::Sitemap(SitemapSettings::default())
    }
}

/// Sitemap-based discovery: an ordered list of sitemap sources plus
/// auto-detection of the conventional locations under the site root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapSettings {
    /// Ordered sitemap sources; disabled entries are kept but skipped.
    pub sitemaps: Vec<SitemapSource>,
    /// Probe `/sitemap.xml`, `/sitemap_index.xml` and `/sitemaps.xml`
    /// when the configured list is empty.
    pub auto_detect: bool,
    /// Recurse into `<sitemapindex>` documents.
    pub follow_sitemap_index: bool,
}

impl Default for SitemapSettings {
    fn default() -> Self {
        Self {
            sitemaps: Vec::new(),
            auto_detect: true,
            follow_sitemap_index: true,
        }
    }
}

/// One configured sitemap document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapSource {
    pub url: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Extraction override applied to URLs discovered through this sitemap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_override: Option<ExtractionOverride>,
}

impl SitemapSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            enabled: true,
            name: None,
            extraction_override: None,
        }
    }
}

/// Crawl-based discovery budget and policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSettings {
    /// Maximum link depth from the root URL (root is depth 0).
    pub max_depth: u32,
    /// Stop once this many pages have been discovered.
    pub max_pages: usize,
    /// Pause between fetch batches, in milliseconds.
    pub crawl_delay_ms: u64,
    /// Number of URLs fetched concurrently per batch.
    pub max_concurrency: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Follow links that leave the site root's host.
    pub follow_external: bool,
    /// Follow HTTP redirects (bounded hop count).
    pub follow_redirects: bool,
    /// Fetch robots.txt once per host and honor its disallow rules.
    pub respect_robots_txt: bool,
    pub include_patterns: Vec<UrlPattern>,
    pub exclude_patterns: Vec<UrlPattern>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_pages: 500,
            crawl_delay_ms: 500,
            max_concurrency: 20,
            timeout_secs: 30,
            follow_external: false,
            follow_redirects: true,
            respect_robots_txt: true,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }
}

/// A glob pattern (`*` and `?` wildcards) with an enabled flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlPattern {
    pub pattern: String,
    pub enabled: bool,
}

impl UrlPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            enabled: true,
        }
    }
}
