use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Current status of a page within its site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Active,
    /// Absent from the latest completed scan's URL set.
    Removed,
    Error,
}

/// Canonical form of a URL used as page identity within a site:
/// scheme and host lowercased, fragment dropped, query order preserved.
///
/// Returns `None` for strings that do not parse as absolute http/https URLs.
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

/// A page tracked per-site; identity is (site id, canonical URL).
/// Rows are never deleted by the core, only by site deletion cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: Uuid,
    pub site_id: Uuid,
    pub url: String,
    pub status: PageStatus,
    pub content_hash: Option<String>,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical_url: Option<String>,
    pub response_code: u16,
    pub load_time_ms: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Upsert input for a page sighting. `first_seen` is preserved on update;
/// every other field overwrites the stored row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub status: PageStatus,
    pub content_hash: Option<String>,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical_url: Option<String>,
    pub response_code: u16,
    pub load_time_ms: u64,
    pub seen_at: DateTime<Utc>,
}

/// One heading in a page's outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// 1..=6
    pub level: u8,
    pub text: String,
}

impl Heading {
    pub fn new(level: u8, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// The extracted structured record for one URL within one scan. Immutable
/// once written; multiple scans of the same page yield multiple rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub id: Uuid,
    pub scan_id: Uuid,
    pub page_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical_url: Option<String>,
    pub meta_keywords: Option<String>,
    /// Ordered trail, outermost first.
    pub breadcrumbs: Vec<String>,
    /// Stable-ordered outline: primary key level, secondary document order.
    pub headings: Vec<Heading>,
    /// Captured Open Graph fields keyed by property name.
    pub open_graph: BTreeMap<String, String>,
    /// Custom-selector and e-commerce captures keyed by field name.
    pub custom_data: BTreeMap<String, serde_json::Value>,
    /// Truncated main-content text when its capture is enabled.
    pub main_content: Option<String>,
    /// SHA-256 over the raw response body, hex-encoded; empty on fetch error.
    pub content_hash: String,
    pub response_code: u16,
    pub load_time_ms: u64,
    pub extraction_config_id: String,
}

impl PageSnapshot {
    /// An empty snapshot shell for a URL; extraction fills in the rest.
    pub fn empty(scan_id: Uuid, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            scan_id,
            page_id: Uuid::nil(),
            url: url.into(),
            title: None,
            meta_description: None,
            canonical_url: None,
            meta_keywords: None,
            breadcrumbs: Vec::new(),
            headings: Vec::new(),
            open_graph: BTreeMap::new(),
            custom_data: BTreeMap::new(),
            main_content: None,
            content_hash: String::new(),
            response_code: 0,
            load_time_ms: 0,
            extraction_config_id: "default".to_string(),
        }
    }

    /// Breadcrumb trail joined for comparison and display.
    pub fn breadcrumb_trail(&self, separator: &str) -> String {
        self.breadcrumbs.join(separator)
    }
}
