use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use futures::future::join_all;
use sitewatch_extraction::extract_links_from_bytes;
use sitewatch_fetch::{Fetcher, RobotsManager};
use sitewatch_types::CrawlSettings;
use tracing::{debug, info, warn};
use url::Url;

use crate::patterns::PatternSet;

/// Breadth-first link crawler with depth and page budgets.
///
/// The frontier holds `(url, depth)` pairs; each loop iteration fetches
/// one batch of up to `max_concurrency` URLs, collects discovered pages
/// (2xx HTML only) and enqueues their in-scope links one level deeper.
pub struct LinkCrawler {
    fetcher: Fetcher,
    robots: Option<RobotsManager>,
    settings: CrawlSettings,
    patterns: PatternSet,
}

impl LinkCrawler {
    pub fn new(fetcher: Fetcher, settings: CrawlSettings) -> Self {
        let patterns = PatternSet::new(&settings.include_patterns, &settings.exclude_patterns);
        let robots = settings.respect_robots_txt.then(|| {
            RobotsManager::new(
                fetcher.user_agent().to_string(),
                Duration::from_secs(settings.timeout_secs),
            )
        });

        Self {
            fetcher,
            robots,
            settings,
            patterns,
        }
    }

    /// Crawl from `root_url`, returning discovered page URLs in
    /// first-seen order.
    pub async fn crawl(&self, root_url: &str) -> Vec<String> {
        let root = match Url::parse(root_url) {
            Ok(root) => root,
            Err(e) => {
                warn!(root = %root_url, error = %e, "Invalid crawl root");
                return Vec::new();
            }
        };

        let mut frontier: VecDeque<(String, u32)> = VecDeque::new();
        frontier.push_back((root.to_string(), 0));

        let mut visited: HashSet<String> = HashSet::new();
        let mut discovered: Vec<String> = Vec::new();
        let mut discovered_set: HashSet<String> = HashSet::new();

        while !frontier.is_empty() && discovered.len() < self.settings.max_pages {
            let batch = self.take_batch(&mut frontier, &mut visited).await;
            if batch.is_empty() {
                continue;
            }

            let fetches = batch
                .iter()
                .map(|(url, _)| self.fetcher.fetch(url));
            let results = join_all(fetches).await;

            for ((url, depth), result) in batch.into_iter().zip(results) {
                if !result.is_success() || !result.is_html() {
                    debug!(url = %url, status = result.status, "Skipping non-HTML or error page");
                    continue;
                }

                // The seed is fetched for its links even when it falls
                // outside the include patterns; only matching URLs count
                // as discovered.
                if self.patterns.should_include(&url) && discovered_set.insert(url.clone()) {
                    discovered.push(url.clone());
                }
                if discovered.len() >= self.settings.max_pages {
                    break;
                }

                if depth < self.settings.max_depth {
                    let base = Url::parse(&url).unwrap_or_else(|_| root.clone());
                    for link in extract_links_from_bytes(&result.body, &base) {
                        if self.in_scope(&link, &root) {
                            frontier.push_back((link, depth + 1));
                        }
                    }
                }
            }

            if self.settings.crawl_delay_ms > 0 && !frontier.is_empty() {
                tokio::time::sleep(Duration::from_millis(self.settings.crawl_delay_ms)).await;
            }
        }

        info!(
            discovered = discovered.len(),
            visited = visited.len(),
            "Crawl finished"
        );
        discovered
    }

    /// Pop the next batch of fetchable URLs: unvisited, within depth, in
    /// pattern scope, and allowed by robots.
    async fn take_batch(
        &self,
        frontier: &mut VecDeque<(String, u32)>,
        visited: &mut HashSet<String>,
    ) -> Vec<(String, u32)> {
        let mut batch = Vec::new();
        while batch.len() < self.settings.max_concurrency {
            let Some((url, depth)) = frontier.pop_front() else {
                break;
            };
            if depth > self.settings.max_depth || !visited.insert(url.clone()) {
                continue;
            }
            // Depth 0 is the seed; it is always fetched so its links can
            // be followed into the include scope.
            if depth > 0 && !self.patterns.should_include(&url) {
                continue;
            }
            if let Some(robots) = &self.robots {
                if !robots.is_allowed(&url).await {
                    debug!(url = %url, "Blocked by robots.txt");
                    continue;
                }
            }
            batch.push((url, depth));
        }
        batch
    }

    /// Link scope filter applied before enqueueing.
    fn in_scope(&self, link: &str, root: &Url) -> bool {
        let Ok(parsed) = Url::parse(link) else {
            return false;
        };
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return false;
        }
        if self.settings.follow_external {
            return true;
        }
        match (parsed.host_str(), root.host_str()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitewatch_fetch::FetchConfig;
    use sitewatch_types::UrlPattern;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn html_page(links: &[&str]) -> ResponseTemplate {
        let anchors: String = links
            .iter()
            .map(|l| format!(r#"<a href="{l}">link</a>"#))
            .collect();
        ResponseTemplate::new(200)
            .set_body_raw(format!("<html><body>{anchors}</body></html>"), "text/html")
    }

    fn crawler(settings: CrawlSettings) -> LinkCrawler {
        LinkCrawler::new(Fetcher::new(FetchConfig::default()).unwrap(), settings)
    }

    fn fast_settings() -> CrawlSettings {
        CrawlSettings {
            crawl_delay_ms: 0,
            respect_robots_txt: false,
            ..CrawlSettings::default()
        }
    }

    #[tokio::test]
    async fn breadth_first_discovery_within_depth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_page(&["/a", "/b"]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(html_page(&["/c"]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(html_page(&[]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c"))
            .respond_with(html_page(&["/d"]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/d"))
            .respond_with(html_page(&[]))
            .mount(&server)
            .await;

        let settings = CrawlSettings {
            max_depth: 2,
            ..fast_settings()
        };
        let urls = crawler(settings).crawl(&format!("{}/", server.uri())).await;

        // Depth 0: /, depth 1: /a /b, depth 2: /c. /d is one level too deep.
        let paths: Vec<String> = urls
            .iter()
            .map(|u| Url::parse(u).unwrap().path().to_string())
            .collect();
        assert_eq!(paths, vec!["/", "/a", "/b", "/c"]);
    }

    #[tokio::test]
    async fn include_exclude_patterns_gate_fetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_page(&[
                "/products/a",
                "/products/private/x",
                "/about",
            ]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/products/a"))
            .respond_with(html_page(&["/products/b"]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/products/b"))
            .respond_with(html_page(&[]))
            .mount(&server)
            .await;

        let settings = CrawlSettings {
            max_depth: 2,
            include_patterns: vec![UrlPattern::new("/products/*")],
            exclude_patterns: vec![UrlPattern::new("/products/private/*")],
            ..fast_settings()
        };
        let urls = crawler(settings).crawl(&format!("{}/", server.uri())).await;

        // The seed is fetched for link discovery but is not itself in the
        // include scope; /about and the excluded private page never are.
        let paths: Vec<String> = urls
            .iter()
            .map(|u| Url::parse(u).unwrap().path().to_string())
            .collect();
        assert_eq!(paths, vec!["/products/a", "/products/b"]);
    }

    #[tokio::test]
    async fn page_cap_stops_the_crawl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_page(&["/p1", "/p2", "/p3", "/p4"]))
            .mount(&server)
            .await;
        for p in ["/p1", "/p2", "/p3", "/p4"] {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(html_page(&[]))
                .mount(&server)
                .await;
        }

        let settings = CrawlSettings {
            max_pages: 3,
            ..fast_settings()
        };
        let urls = crawler(settings).crawl(&format!("{}/", server.uri())).await;
        assert_eq!(urls.len(), 3);
    }

    #[tokio::test]
    async fn external_links_skipped_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_page(&["https://elsewhere.example/x", "/local"]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/local"))
            .respond_with(html_page(&[]))
            .mount(&server)
            .await;

        let urls = crawler(fast_settings())
            .crawl(&format!("{}/", server.uri()))
            .await;
        assert_eq!(urls.len(), 2);
        assert!(urls.iter().all(|u| u.starts_with(&server.uri())));
    }

    #[tokio::test]
    async fn non_html_responses_are_not_discovered() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_page(&["/data.json", "/missing"]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let urls = crawler(fast_settings())
            .crawl(&format!("{}/", server.uri()))
            .await;
        let paths: Vec<String> = urls
            .iter()
            .map(|u| Url::parse(u).unwrap().path().to_string())
            .collect();
        assert_eq!(paths, vec!["/"]);
    }

    #[tokio::test]
    async fn robots_disallow_short_circuits_inclusion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /blocked/\n"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_page(&["/blocked/page", "/open"]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/open"))
            .respond_with(html_page(&[]))
            .mount(&server)
            .await;

        let settings = CrawlSettings {
            respect_robots_txt: true,
            crawl_delay_ms: 0,
            ..CrawlSettings::default()
        };
        let urls = crawler(settings).crawl(&format!("{}/", server.uri())).await;
        let paths: Vec<String> = urls
            .iter()
            .map(|u| Url::parse(u).unwrap().path().to_string())
            .collect();
        assert_eq!(paths, vec!["/", "/open"]);
    }
}
