use std::collections::HashSet;

use sitewatch_fetch::Fetcher;
use sitewatch_types::{ExtractionOverride, SitemapSettings};
use tracing::{debug, info, warn};
use url::Url;
use xml::reader::{EventReader, XmlEvent};

/// Sitemap-index nesting cap, guarding against cyclic indexes.
const MAX_INDEX_DEPTH: usize = 5;

/// Conventional sitemap locations probed during auto-detection.
const AUTO_DETECT_PATHS: [&str; 3] = ["/sitemap.xml", "/sitemap_index.xml", "/sitemaps.xml"];

/// What a sitemap document turned out to be.
#[derive(Debug, PartialEq, Eq)]
enum SitemapKind {
    UrlSet,
    Index,
}

/// Resolves a site's sitemap configuration into a URL list.
///
/// Individual sitemap failures are logged and skipped; the scan carries on
/// with whatever the other sources produced.
pub struct SitemapParser {
    fetcher: Fetcher,
    settings: SitemapSettings,
}

impl SitemapParser {
    pub fn new(fetcher: Fetcher, settings: SitemapSettings) -> Self {
        Self { fetcher, settings }
    }

    /// Full discovery flow: enabled configured sitemaps, or auto-detected
    /// ones when the list is empty. Returns page URLs deduplicated in
    /// first-seen order.
    pub async fn discover(&self, root_url: &str) -> Vec<String> {
        self.discover_with_overrides(root_url)
            .await
            .into_iter()
            .map(|(url, _)| url)
            .collect()
    }

    /// Like [`discover`](Self::discover), but each URL carries the
    /// extraction override of the sitemap source it came from (inherited
    /// through sitemap-index recursion).
    pub async fn discover_with_overrides(
        &self,
        root_url: &str,
    ) -> Vec<(String, Option<ExtractionOverride>)> {
        let mut sources: Vec<(String, Option<ExtractionOverride>)> = self
            .settings
            .sitemaps
            .iter()
            .filter(|s| s.enabled)
            .map(|s| (s.url.clone(), s.extraction_override.clone()))
            .collect();

        if sources.is_empty() && self.settings.auto_detect {
            sources = self
                .auto_detect(root_url)
                .await
                .into_iter()
                .map(|url| (url, None))
                .collect();
        }

        let mut urls = Vec::new();
        let mut seen_urls = HashSet::new();
        let mut seen_sitemaps = HashSet::new();

        // Breadth-first over sitemap documents; index children join the
        // queue at depth + 1 while URL-set entries join the result.
        let mut queue: Vec<(String, usize, Option<ExtractionOverride>)> = sources
            .into_iter()
            .map(|(url, override_)| (url, 0, override_))
            .collect();
        let mut cursor = 0;
        while cursor < queue.len() {
            let (sitemap_url, depth, override_) = queue[cursor].clone();
            cursor += 1;

            if !seen_sitemaps.insert(sitemap_url.clone()) {
                continue;
            }

            let result = self.fetcher.fetch(&sitemap_url).await;
            if !result.is_success() {
                warn!(
                    sitemap = %sitemap_url,
                    status = result.status,
                    error = result.error.as_deref().unwrap_or(""),
                    "Skipping unreachable sitemap"
                );
                continue;
            }

            let content = String::from_utf8_lossy(&result.body);
            let (kind, locs) = parse_sitemap_content(&content);
            debug!(sitemap = %sitemap_url, kind = ?kind, locs = locs.len(), "Parsed sitemap");

            match kind {
                SitemapKind::Index => {
                    if !self.settings.follow_sitemap_index {
                        continue;
                    }
                    if depth + 1 > MAX_INDEX_DEPTH {
                        warn!(sitemap = %sitemap_url, "Sitemap index nesting too deep");
                        continue;
                    }
                    for child in locs {
                        queue.push((child, depth + 1, override_.clone()));
                    }
                }
                SitemapKind::UrlSet => {
                    for url in locs {
                        if seen_urls.insert(url.clone()) {
                            urls.push((url, override_.clone()));
                        }
                    }
                }
            }
        }

        info!(urls = urls.len(), "Sitemap discovery finished");
        urls
    }

    /// Probe the conventional locations under the site root, plus any
    /// `Sitemap:` directives advertised in robots.txt (RFC 9309).
    async fn auto_detect(&self, root_url: &str) -> Vec<String> {
        let Ok(root) = Url::parse(root_url) else {
            warn!(root = %root_url, "Invalid site root for sitemap auto-detection");
            return Vec::new();
        };
        let origin = root.origin().ascii_serialization();

        let mut found = Vec::new();
        for path in AUTO_DETECT_PATHS {
            let candidate = format!("{origin}{path}");
            let result = self.fetcher.fetch(&candidate).await;
            if result.is_success() && !result.body.is_empty() {
                debug!(sitemap = %candidate, "Auto-detected sitemap");
                found.push(candidate);
                break;
            }
        }

        for sitemap in self.robots_sitemaps(&origin).await {
            if !found.contains(&sitemap) {
                found.push(sitemap);
            }
        }

        found
    }

    async fn robots_sitemaps(&self, origin: &str) -> Vec<String> {
        let robots_url = format!("{origin}/robots.txt");
        let result = self.fetcher.fetch(&robots_url).await;
        if !result.is_success() {
            return Vec::new();
        }

        let content = String::from_utf8_lossy(&result.body);
        let mut sitemaps = Vec::new();
        for line in content.lines() {
            let trimmed = line.trim();
            let Some(value) = trimmed
                .get(..8)
                .filter(|head| head.eq_ignore_ascii_case("sitemap:"))
                .map(|_| trimmed[8..].trim())
            else {
                continue;
            };
            if let Ok(parsed) = Url::parse(value) {
                if parsed.scheme() == "http" || parsed.scheme() == "https" {
                    sitemaps.push(value.to_string());
                }
            }
        }
        sitemaps
    }
}

/// Streaming parse of one sitemap document: classify the root element and
/// collect every `<loc>` text. Tolerant of junk around and inside the XML.
fn parse_sitemap_content(content: &str) -> (SitemapKind, Vec<String>) {
    let mut kind = SitemapKind::UrlSet;
    let mut locs = Vec::new();
    let mut saw_root = false;
    let mut in_loc = false;
    let mut current = String::new();

    for event in EventReader::from_str(content) {
        match event {
            Ok(XmlEvent::StartElement { name, .. }) => {
                let local = name.local_name.as_str();
                if !saw_root {
                    saw_root = true;
                    if local == "sitemapindex" {
                        kind = SitemapKind::Index;
                    }
                }
                if local == "loc" {
                    in_loc = true;
                    current.clear();
                }
            }
            Ok(XmlEvent::Characters(data)) | Ok(XmlEvent::CData(data)) => {
                if in_loc {
                    current.push_str(&data);
                }
            }
            Ok(XmlEvent::EndElement { name }) => {
                if name.local_name == "loc" {
                    in_loc = false;
                    let url = current.trim().to_string();
                    if !url.is_empty() {
                        locs.push(url);
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "Stopping sitemap parse on malformed XML");
                break;
            }
            _ => {}
        }
    }

    (kind, locs)
}
