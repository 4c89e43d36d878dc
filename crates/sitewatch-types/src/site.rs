use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::discovery::DiscoverySettings;
use crate::extraction::ExtractionSettings;

/// Site lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteStatus {
    Active,
    Paused,
    Error,
    Archived,
}

/// Scheduling knobs; actual dispatch happens through job `scheduled_for`,
/// this is only the data the scheduler derives it from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    pub enabled: bool,
    /// Interval between automatic scans, in hours.
    pub scan_interval_hours: u32,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_hours: 6,
        }
    }
}

/// Rollup counters from the last completed scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteCounters {
    pub total_pages: u32,
    pub new_pages: u32,
    pub changed_pages: u32,
    pub removed_pages: u32,
}

/// A registered external web property the system monitors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    /// Absolute http/https root URL.
    pub root_url: String,
    pub discovery: DiscoverySettings,
    pub extraction: ExtractionSettings,
    pub schedule: ScheduleSettings,
    pub status: SiteStatus,
    /// Set iff `status` is `Archived`.
    pub archived_at: Option<DateTime<Utc>>,
    pub counters: SiteCounters,
    pub last_scan: Option<DateTime<Utc>>,
    pub next_scan: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Site {
    /// Create an active site with default settings.
    pub fn new(owner_id: Uuid, name: impl Into<String>, root_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            root_url: root_url.into(),
            discovery: DiscoverySettings::default(),
            extraction: ExtractionSettings::default(),
            schedule: ScheduleSettings::default(),
            status: SiteStatus::Active,
            archived_at: None,
            counters: SiteCounters::default(),
            last_scan: None,
            next_scan: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_discovery(mut self, discovery: DiscoverySettings) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_extraction(mut self, extraction: ExtractionSettings) -> Self {
        self.extraction = extraction;
        self
    }

    /// Archive the site; the retention sweeper deletes it after the
    /// configured window.
    pub fn archive(&mut self) {
        self.status = SiteStatus::Archived;
        self.archived_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_site_is_active() {
        let site = Site::new(Uuid::new_v4(), "Example", "https://a.example/");
        assert_eq!(site.status, SiteStatus::Active);
        assert!(site.archived_at.is_none());
        assert_eq!(site.counters, SiteCounters::default());
    }

    #[test]
    fn archive_sets_timestamp() {
        let mut site = Site::new(Uuid::new_v4(), "Example", "https://a.example/");
        site.archive();
        assert_eq!(site.status, SiteStatus::Archived);
        assert!(site.archived_at.is_some());
    }
}
