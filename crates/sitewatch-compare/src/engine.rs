use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use sitewatch_storage::{Storage, StorageError};
use sitewatch_types::{
    ChangeImpact, ComparisonSummary, PageChangeType, PageComparisonResult, PageSnapshot,
    RunComparison, Scan,
};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::diff::{compare_snapshots, field_changes_for_added, field_changes_for_removed};

/// Comparison request errors.
#[derive(Error, Debug)]
pub enum CompareError {
    #[error("scan not found: {0}")]
    ScanNotFound(Uuid),

    #[error("scans {0} and {1} belong to different sites")]
    SiteMismatch(Uuid, Uuid),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Loads two scans' snapshot sets and produces the full diff document.
pub struct ComparisonEngine {
    storage: Arc<dyn Storage>,
}

impl ComparisonEngine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn compare(
        &self,
        base_scan_id: Uuid,
        compare_scan_id: Uuid,
    ) -> Result<RunComparison, CompareError> {
        let base_scan = self.load_scan(base_scan_id).await?;
        let compare_scan = self.load_scan(compare_scan_id).await?;
        if base_scan.site_id != compare_scan.site_id {
            return Err(CompareError::SiteMismatch(base_scan_id, compare_scan_id));
        }

        let base = self.snapshots_by_url(base_scan_id).await?;
        let compare = self.snapshots_by_url(compare_scan_id).await?;
        debug!(
            base = base.len(),
            compare = compare.len(),
            "Loaded snapshot sets"
        );

        // BTreeMap union keeps the output deterministic by URL.
        let urls: Vec<&String> = {
            let mut keys: Vec<&String> = base.keys().chain(compare.keys()).collect();
            keys.sort();
            keys.dedup();
            keys
        };

        let mut pages = Vec::with_capacity(urls.len());
        let mut summary = ComparisonSummary {
            total_base: base.len(),
            total_compare: compare.len(),
            base_error_pages: base_scan.counters.error_pages,
            compare_error_pages: compare_scan.counters.error_pages,
            ..ComparisonSummary::default()
        };

        for url in urls {
            let result = compare_page(url, base.get(url), compare.get(url));
            match result.change_type {
                PageChangeType::Added => summary.added += 1,
                PageChangeType::Removed => summary.removed += 1,
                PageChangeType::Modified => summary.modified += 1,
                PageChangeType::Unchanged => summary.unchanged += 1,
            }
            pages.push(result);
        }

        info!(
            base_scan = %base_scan_id,
            compare_scan = %compare_scan_id,
            added = summary.added,
            removed = summary.removed,
            modified = summary.modified,
            unchanged = summary.unchanged,
            "Comparison computed"
        );

        Ok(RunComparison {
            site_id: base_scan.site_id,
            base_scan_id,
            compare_scan_id,
            generated_at: Utc::now(),
            summary,
            pages,
        })
    }

    async fn load_scan(&self, scan_id: Uuid) -> Result<Scan, CompareError> {
        self.storage
            .get_scan(scan_id)
            .await?
            .ok_or(CompareError::ScanNotFound(scan_id))
    }

    async fn snapshots_by_url(
        &self,
        scan_id: Uuid,
    ) -> Result<BTreeMap<String, PageSnapshot>, CompareError> {
        let snapshots = self.storage.list_snapshots_for_scan(scan_id).await?;
        Ok(snapshots
            .into_iter()
            .map(|s| (s.url.clone(), s))
            .collect())
    }
}

/// Classify one URL across the two scans.
fn compare_page(
    url: &str,
    base: Option<&PageSnapshot>,
    compare: Option<&PageSnapshot>,
) -> PageComparisonResult {
    let (change_type, changes) = match (base, compare) {
        (None, Some(new)) => (PageChangeType::Added, field_changes_for_added(new)),
        (Some(old), None) => (PageChangeType::Removed, field_changes_for_removed(old)),
        (Some(old), Some(new)) => {
            let changes = compare_snapshots(old, new);
            if changes.is_empty() {
                (PageChangeType::Unchanged, changes)
            } else {
                (PageChangeType::Modified, changes)
            }
        }
        (None, None) => (PageChangeType::Unchanged, Vec::new()),
    };

    let severity: Option<ChangeImpact> = changes.iter().map(|c| c.impact).max();

    PageComparisonResult {
        url: url.to_string(),
        base: base.cloned(),
        compare: compare.cloned(),
        change_type,
        changes,
        severity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sitewatch_storage::MemoryStorage;
    use sitewatch_types::{Heading, ScanSettings};

    fn snapshot(scan_id: Uuid, url: &str, title: &str) -> PageSnapshot {
        let mut snap = PageSnapshot::empty(scan_id, url);
        snap.page_id = Uuid::new_v4();
        snap.title = Some(title.to_string());
        snap.content_hash = format!("hash-of-{title}");
        snap
    }

    async fn seed_two_scans(
        storage: &MemoryStorage,
        base_pages: &[(&str, &str)],
        compare_pages: &[(&str, &str)],
    ) -> (Uuid, Uuid) {
        let site_id = Uuid::new_v4();
        let base = Scan::new(site_id, ScanSettings::default());
        let compare = Scan::new(site_id, ScanSettings::default());
        let (base_id, compare_id) = (base.id, compare.id);
        storage.create_scan(base).await.unwrap();
        storage.create_scan(compare).await.unwrap();

        let base_snaps: Vec<PageSnapshot> = base_pages
            .iter()
            .map(|(url, title)| snapshot(base_id, url, title))
            .collect();
        let compare_snaps: Vec<PageSnapshot> = compare_pages
            .iter()
            .map(|(url, title)| snapshot(compare_id, url, title))
            .collect();
        storage.insert_snapshots(base_snaps).await.unwrap();
        storage.insert_snapshots(compare_snaps).await.unwrap();

        (base_id, compare_id)
    }

    #[tokio::test]
    async fn two_scan_title_modification() {
        let storage = Arc::new(MemoryStorage::new());
        let (base_id, compare_id) = seed_two_scans(
            &storage,
            &[("https://a.example/p", "Old")],
            &[("https://a.example/p", "New")],
        )
        .await;

        let engine = ComparisonEngine::new(storage);
        let comparison = engine.compare(base_id, compare_id).await.unwrap();

        assert_eq!(comparison.summary.modified, 1);
        assert_eq!(comparison.pages.len(), 1);
        let page = &comparison.pages[0];
        assert_eq!(page.change_type, PageChangeType::Modified);
        assert_eq!(page.changes.len(), 1);
        assert_eq!(page.changes[0].field, "title");
        assert_eq!(page.changes[0].old_value.as_deref(), Some("Old"));
        assert_eq!(page.changes[0].new_value.as_deref(), Some("New"));
        assert_eq!(page.severity, Some(ChangeImpact::High));
    }

    #[tokio::test]
    async fn url_appears_and_disappears() {
        let storage = Arc::new(MemoryStorage::new());
        let (base_id, compare_id) = seed_two_scans(
            &storage,
            &[("https://a.example/a", "A"), ("https://a.example/b", "B")],
            &[("https://a.example/a", "A"), ("https://a.example/c", "C")],
        )
        .await;

        let engine = ComparisonEngine::new(storage);
        let comparison = engine.compare(base_id, compare_id).await.unwrap();

        assert_eq!(comparison.summary.added, 1);
        assert_eq!(comparison.summary.removed, 1);
        assert_eq!(comparison.summary.unchanged, 1);
        assert_eq!(comparison.summary.modified, 0);

        let by_url: BTreeMap<&str, &PageComparisonResult> = comparison
            .pages
            .iter()
            .map(|p| (p.url.as_str(), p))
            .collect();
        assert_eq!(
            by_url["https://a.example/b"].change_type,
            PageChangeType::Removed
        );
        assert_eq!(
            by_url["https://a.example/c"].change_type,
            PageChangeType::Added
        );
        assert_eq!(
            by_url["https://a.example/a"].change_type,
            PageChangeType::Unchanged
        );
    }

    #[tokio::test]
    async fn page_classes_partition_the_url_union() {
        let storage = Arc::new(MemoryStorage::new());
        let (base_id, compare_id) = seed_two_scans(
            &storage,
            &[
                ("https://a.example/1", "one"),
                ("https://a.example/2", "two"),
                ("https://a.example/3", "three"),
            ],
            &[
                ("https://a.example/2", "two"),
                ("https://a.example/3", "III"),
                ("https://a.example/4", "four"),
            ],
        )
        .await;

        let engine = ComparisonEngine::new(storage);
        let comparison = engine.compare(base_id, compare_id).await.unwrap();
        let summary = comparison.summary;

        assert_eq!(
            summary.added + summary.removed + summary.modified + summary.unchanged,
            comparison.pages.len()
        );
        assert_eq!(comparison.pages.len(), 4); // |{1,2,3,4}|
    }

    #[tokio::test]
    async fn cross_site_comparison_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let scan_a = Scan::new(Uuid::new_v4(), ScanSettings::default());
        let scan_b = Scan::new(Uuid::new_v4(), ScanSettings::default());
        let (a, b) = (scan_a.id, scan_b.id);
        storage.create_scan(scan_a).await.unwrap();
        storage.create_scan(scan_b).await.unwrap();

        let engine = ComparisonEngine::new(storage);
        assert!(matches!(
            engine.compare(a, b).await,
            Err(CompareError::SiteMismatch(_, _))
        ));
    }

    #[tokio::test]
    async fn unknown_scan_rejected() {
        let engine = ComparisonEngine::new(Arc::new(MemoryStorage::new()));
        assert!(matches!(
            engine.compare(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(CompareError::ScanNotFound(_))
        ));
    }

    /// Inversion: swapping base and compare swaps added/removed and
    /// old/new values, keeps unchanged counts, and preserves severity.
    fn check_inversion(base_pages: Vec<(String, String)>, compare_pages: Vec<(String, String)>) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let storage = Arc::new(MemoryStorage::new());
            let base_refs: Vec<(&str, &str)> = base_pages
                .iter()
                .map(|(u, t)| (u.as_str(), t.as_str()))
                .collect();
            let compare_refs: Vec<(&str, &str)> = compare_pages
                .iter()
                .map(|(u, t)| (u.as_str(), t.as_str()))
                .collect();
            let (base_id, compare_id) =
                seed_two_scans(&storage, &base_refs, &compare_refs).await;

            let engine = ComparisonEngine::new(storage);
            let forward = engine.compare(base_id, compare_id).await.unwrap();
            let backward = engine.compare(compare_id, base_id).await.unwrap();

            assert_eq!(forward.summary.added, backward.summary.removed);
            assert_eq!(forward.summary.removed, backward.summary.added);
            assert_eq!(forward.summary.modified, backward.summary.modified);
            assert_eq!(forward.summary.unchanged, backward.summary.unchanged);

            for (f, b) in forward.pages.iter().zip(backward.pages.iter()) {
                assert_eq!(f.url, b.url);
                assert_eq!(f.severity, b.severity);
                for (fc, bc) in f.changes.iter().zip(b.changes.iter()) {
                    assert_eq!(fc.field, bc.field);
                    assert_eq!(fc.old_value, bc.new_value);
                    assert_eq!(fc.new_value, bc.old_value);
                }
            }
        });
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn comparison_inversion(
            base in proptest::collection::vec(("[a-d]{1,2}", "[A-C]{1,2}"), 0..5),
            compare in proptest::collection::vec(("[a-d]{1,2}", "[A-C]{1,2}"), 0..5),
        ) {
            let to_pages = |entries: Vec<(String, String)>| -> Vec<(String, String)> {
                entries
                    .into_iter()
                    .map(|(path, title)| (format!("https://a.example/{path}"), title))
                    .collect()
            };
            check_inversion(to_pages(base), to_pages(compare));
        }
    }
}
