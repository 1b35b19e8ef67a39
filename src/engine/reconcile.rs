//! Cross-check of classified item sizes against OS-reported disk usage.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::disk::DiskStats;
use crate::scanner::{SkipReason, SkippedItem};

use super::events::ItemRecord;

/// Paths kept per skip bucket.
const SAMPLE_PATHS: usize = 5;

/// Below this mapped share, unmapped space is flagged as significant.
pub const LOW_MAPPED_PCT: f64 = 50.0;

/// Skipped paths grouped by reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipBucket {
    pub reason: SkipReason,
    pub count: usize,
    pub sample_paths: Vec<PathBuf>,
    pub remediation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub mapped_bytes: u64,
    pub unmapped_bytes: u64,
    /// Share of used space covered by items, one decimal
    pub mapped_pct: f64,
    pub disk_total: u64,
    pub disk_used: u64,
    pub disk_free: u64,
    /// Items cover less than half of the used space and paths were skipped
    pub unmapped_significant: bool,
    /// Largest bucket first
    pub skipped_by_reason: Vec<SkipBucket>,
}

/// `unmapped = used - mapped`, floored at zero, so `mapped + unmapped ==
/// used` whenever the items fit on the disk.
pub fn reconcile(items: &[ItemRecord], skipped: &[SkippedItem], disk: &DiskStats) -> Reconciliation {
    let mapped_bytes = items
        .iter()
        .fold(0u64, |acc, item| acc.saturating_add(item.size_bytes));
    let unmapped_bytes = disk.used.saturating_sub(mapped_bytes);

    let mapped_pct = if disk.used == 0 {
        0.0
    } else {
        (mapped_bytes as f64 / disk.used as f64 * 1000.0).round() / 10.0
    };

    let mut buckets: BTreeMap<SkipReason, SkipBucket> = BTreeMap::new();
    for item in skipped {
        let bucket = buckets.entry(item.reason).or_insert_with(|| SkipBucket {
            reason: item.reason,
            count: 0,
            sample_paths: Vec::new(),
            remediation: item.reason.remediation().to_string(),
        });
        bucket.count += 1;
        if bucket.sample_paths.len() < SAMPLE_PATHS {
            bucket.sample_paths.push(item.path.clone());
        }
    }
    let mut skipped_by_reason: Vec<SkipBucket> = buckets.into_values().collect();
    skipped_by_reason.sort_by(|a, b| b.count.cmp(&a.count).then(a.reason.cmp(&b.reason)));

    let unmapped_significant = mapped_pct < LOW_MAPPED_PCT && !skipped_by_reason.is_empty();
    if unmapped_significant {
        tracing::info!(mapped_pct, skipped = skipped.len(), "large unmapped share");
    }

    Reconciliation {
        mapped_bytes,
        unmapped_bytes,
        mapped_pct,
        disk_total: disk.total,
        disk_used: disk.used,
        disk_free: disk.free,
        unmapped_significant,
        skipped_by_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Category, RiskLevel};
    use crate::engine::events::Phase;

    fn item(size: u64) -> ItemRecord {
        ItemRecord {
            id: "item-0".into(),
            name: "x".into(),
            path: PathBuf::from("/x"),
            category: Category::GeneralCache,
            description: "x".into(),
            size_bytes: size,
            size_formatted: String::new(),
            file_count: 1,
            last_used: None,
            days_since_used: 0,
            risk: RiskLevel::Safe,
            confidence: 1.0,
            recovery_note: String::new(),
            incomplete: false,
            phase: Phase::Deep,
        }
    }

    fn disk(used: u64) -> DiskStats {
        DiskStats {
            total: used * 2,
            used,
            free: used,
            available: used,
        }
    }

    #[test]
    fn mapped_plus_unmapped_equals_used() {
        let items = [item(3_000), item(1_500)];
        let r = reconcile(&items, &[], &disk(10_000));
        assert_eq!(r.mapped_bytes, 4_500);
        assert_eq!(r.unmapped_bytes, 5_500);
        assert_eq!(r.mapped_bytes + r.unmapped_bytes, r.disk_used);
        assert_eq!(r.mapped_pct, 45.0);
    }

    #[test]
    fn unmapped_floors_at_zero() {
        let r = reconcile(&[item(20_000)], &[], &disk(10_000));
        assert_eq!(r.unmapped_bytes, 0);
        assert_eq!(r.mapped_pct, 200.0);
    }

    #[test]
    fn empty_disk_has_zero_pct() {
        let r = reconcile(&[], &[], &DiskStats::default());
        assert_eq!(r.mapped_pct, 0.0);
        assert!(!r.unmapped_significant);
    }

    #[test]
    fn pct_rounds_to_one_decimal() {
        let r = reconcile(&[item(1)], &[], &disk(3));
        assert_eq!(r.mapped_pct, 33.3);
    }

    #[test]
    fn skipped_items_are_bucketed() {
        let skipped: Vec<_> = (0..7)
            .map(|i| SkippedItem::new(format!("/locked/{i}"), SkipReason::PermissionDenied))
            .chain(std::iter::once(SkippedItem::new("/slow", SkipReason::SlowFilesystem)))
            .collect();

        let r = reconcile(&[item(10)], &skipped, &disk(10_000));
        assert!(r.unmapped_significant);
        assert_eq!(r.skipped_by_reason.len(), 2);

        let denied = &r.skipped_by_reason[0];
        assert_eq!(denied.reason, SkipReason::PermissionDenied);
        assert_eq!(denied.count, 7);
        assert_eq!(denied.sample_paths.len(), SAMPLE_PATHS);
        assert!(!denied.remediation.is_empty());
    }
}
