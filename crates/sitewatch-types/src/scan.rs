use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::discovery::{DiscoveryMethod, DiscoverySettings};
use crate::extraction::ExtractionSettings;

/// Scan lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ScanStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanStatus::Running)
    }
}

/// Settings snapshot taken when the scan starts, so later configuration
/// edits do not change what a historical scan means.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSettings {
    pub discovery: DiscoverySettings,
    pub extraction: ExtractionSettings,
}

/// Page counters for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCounters {
    pub total_pages: u32,
    pub new_pages: u32,
    pub changed_pages: u32,
    pub removed_pages: u32,
    pub error_pages: u32,
}

/// One end-to-end discovery + fetch + extract + persist pass over a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: Uuid,
    pub site_id: Uuid,
    pub discovery_method: DiscoveryMethod,
    pub settings: ScanSettings,
    pub status: ScanStatus,
    pub started_at: DateTime<Utc>,
    /// Set iff `status` is terminal.
    pub completed_at: Option<DateTime<Utc>>,
    pub counters: ScanCounters,
    /// Capped preview of scanned URLs (at most [`Scan::URL_PREVIEW_CAP`]).
    pub scanned_urls: Vec<String>,
    pub error: Option<String>,
    /// Non-fatal configuration problems hit during the scan.
    pub warnings: Vec<String>,
}

impl Scan {
    /// Preview cap on stored URLs.
    pub const URL_PREVIEW_CAP: usize = 1000;

    pub fn new(site_id: Uuid, settings: ScanSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_id,
            discovery_method: settings.discovery.method(),
            settings,
            status: ScanStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            counters: ScanCounters::default(),
            scanned_urls: Vec::new(),
            error: None,
            warnings: Vec::new(),
        }
    }

    /// Mark completed with final counters and the capped URL preview.
    pub fn complete(&mut self, counters: ScanCounters, mut urls: Vec<String>) {
        urls.truncate(Self::URL_PREVIEW_CAP);
        self.status = ScanStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.counters = counters;
        self.scanned_urls = urls;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = ScanStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }

    pub fn cancel(&mut self) {
        self.status = ScanStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    /// Wall-clock duration, available once the scan is terminal.
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds())
    }
}
