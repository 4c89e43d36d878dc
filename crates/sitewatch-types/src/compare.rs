use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::page::PageSnapshot;

/// Qualitative weight of a field change, surfaced up to page severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeImpact {
    Low,
    Medium,
    High,
}

/// What happened to a single field between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldChangeType {
    Added,
    Removed,
    Modified,
}

/// One classified field difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: String,
    #[serde(rename = "type")]
    pub change_type: FieldChangeType,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub impact: ChangeImpact,
}

impl FieldChange {
    pub fn added(field: impl Into<String>, new_value: impl Into<String>, impact: ChangeImpact) -> Self {
        Self {
            field: field.into(),
            change_type: FieldChangeType::Added,
            old_value: None,
            new_value: Some(new_value.into()),
            impact,
        }
    }

    pub fn removed(
        field: impl Into<String>,
        old_value: impl Into<String>,
        impact: ChangeImpact,
    ) -> Self {
        Self {
            field: field.into(),
            change_type: FieldChangeType::Removed,
            old_value: Some(old_value.into()),
            new_value: None,
            impact,
        }
    }

    pub fn modified(
        field: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
        impact: ChangeImpact,
    ) -> Self {
        Self {
            field: field.into(),
            change_type: FieldChangeType::Modified,
            old_value: Some(old_value.into()),
            new_value: Some(new_value.into()),
            impact,
        }
    }
}

/// How a URL moved between the base and compare scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageChangeType {
    Added,
    Removed,
    Modified,
    Unchanged,
}

/// Comparison outcome for one URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageComparisonResult {
    pub url: String,
    pub base: Option<PageSnapshot>,
    pub compare: Option<PageSnapshot>,
    pub change_type: PageChangeType,
    pub changes: Vec<FieldChange>,
    /// Maximum impact across `changes`; absent when nothing changed.
    pub severity: Option<ChangeImpact>,
}

/// Rollup over a whole run comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    pub total_base: usize,
    pub total_compare: usize,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub base_error_pages: u32,
    pub compare_error_pages: u32,
}

/// Full diff between two scans of the same site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunComparison {
    pub site_id: Uuid,
    pub base_scan_id: Uuid,
    pub compare_scan_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub summary: ComparisonSummary,
    pub pages: Vec<PageComparisonResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impact_ordering() {
        assert!(ChangeImpact::High > ChangeImpact::Medium);
        assert!(ChangeImpact::Medium > ChangeImpact::Low);
    }

    #[test]
    fn field_change_constructors() {
        let added = FieldChange::added("title", "New", ChangeImpact::High);
        assert_eq!(added.change_type, FieldChangeType::Added);
        assert!(added.old_value.is_none());
        assert_eq!(added.new_value.as_deref(), Some("New"));

        let modified = FieldChange::modified("title", "Old", "New", ChangeImpact::High);
        assert_eq!(modified.old_value.as_deref(), Some("Old"));
        assert_eq!(modified.new_value.as_deref(), Some("New"));
    }
}
