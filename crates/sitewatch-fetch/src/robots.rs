use std::time::Duration;

use dashmap::DashMap;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use tracing::{debug, warn};
use url::Url;

/// robots.txt gate with a per-host cache.
///
/// Each host's robots.txt is fetched at most once per manager; the manager
/// is constructed per scan, which gives the one-fetch-per-host-per-scan
/// contract. A missing or unreadable robots.txt allows everything.
pub struct RobotsManager {
    client: Client,
    user_agent: String,
    /// host:port → robots.txt body; `None` caches a failed/absent fetch.
    cache: DashMap<String, Option<String>>,
}

impl RobotsManager {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        let user_agent = user_agent.into();
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            user_agent,
            cache: DashMap::new(),
        }
    }

    /// Whether the configured user-agent may crawl `url`.
    pub async fn is_allowed(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };
        let origin = parsed.origin().ascii_serialization();

        let body = match self.cache.get(&origin) {
            Some(cached) => cached.clone(),
            None => {
                let fetched = self.fetch_robots(&origin).await;
                self.cache.insert(origin.clone(), fetched.clone());
                fetched
            }
        };

        match body {
            Some(robots) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(&robots, &self.user_agent, url)
            }
            // No robots.txt means no restrictions.
            None => true,
        }
    }

    async fn fetch_robots(&self, origin: &str) -> Option<String> {
        let robots_url = format!("{origin}/robots.txt");
        debug!(url = %robots_url, "Fetching robots.txt");

        match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => response.text().await.ok(),
            Ok(response) => {
                debug!(url = %robots_url, status = %response.status(), "No usable robots.txt");
                None
            }
            Err(e) => {
                warn!(url = %robots_url, error = %e, "robots.txt fetch failed");
                None
            }
        }
    }
}
