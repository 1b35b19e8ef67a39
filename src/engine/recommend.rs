//! Cleanup suggestions derived from a finished scan.

use serde::{Deserialize, Serialize};

use crate::classifier::{Category, RiskLevel};
use crate::scanner::{format_size, StaleProject};

use super::events::ItemRecord;
use super::reconcile::Reconciliation;

/// Caution items older than this are suggested for review.
const REVIEW_AFTER_DAYS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Every safe item of a category
    SafeCleanup,
    /// Caution items unused for a while
    Review,
    StaleProjects,
    /// Much of the disk could not be attributed
    Unmapped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub title: String,
    pub detail: String,
    pub bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Item ids the recommendation covers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item_ids: Vec<String>,
}

/// Recommendations, largest first. The unmapped warning, when present,
/// comes last and is not sorted by size.
pub fn recommend(
    items: &[ItemRecord],
    stale_projects: &[StaleProject],
    reconciliation: &Reconciliation,
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    for category in Category::ALL {
        let safe: Vec<&ItemRecord> = items
            .iter()
            .filter(|i| i.category == category && i.risk == RiskLevel::Safe)
            .collect();
        let bytes: u64 = safe.iter().map(|i| i.size_bytes).sum();
        if bytes == 0 {
            continue;
        }
        out.push(Recommendation {
            kind: RecommendationKind::SafeCleanup,
            title: format!("Clear {}", category.label().to_lowercase()),
            detail: format!(
                "{} safe item(s) totalling {}; applications recreate them on demand.",
                safe.len(),
                format_size(bytes)
            ),
            bytes,
            category: Some(category),
            item_ids: safe.iter().map(|i| i.id.clone()).collect(),
        });
    }

    let review: Vec<&ItemRecord> = items
        .iter()
        .filter(|i| i.risk == RiskLevel::Caution && i.days_since_used >= REVIEW_AFTER_DAYS)
        .collect();
    let review_bytes: u64 = review.iter().map(|i| i.size_bytes).sum();
    if review_bytes > 0 {
        out.push(Recommendation {
            kind: RecommendationKind::Review,
            title: "Review unused caches".to_string(),
            detail: format!(
                "{} item(s) unused for {}+ days hold {}; removing them costs re-downloads or rebuilds.",
                review.len(),
                REVIEW_AFTER_DAYS,
                format_size(review_bytes)
            ),
            bytes: review_bytes,
            category: None,
            item_ids: review.iter().map(|i| i.id.clone()).collect(),
        });
    }

    let stale_bytes: u64 = stale_projects.iter().map(|p| p.artifact_bytes).sum();
    if stale_bytes > 0 {
        out.push(Recommendation {
            kind: RecommendationKind::StaleProjects,
            title: "Remove build artifacts of stale projects".to_string(),
            detail: format!(
                "{} project(s) untouched for months hold {} of build output.",
                stale_projects.len(),
                format_size(stale_bytes)
            ),
            bytes: stale_bytes,
            category: Some(Category::DevCache),
            item_ids: Vec::new(),
        });
    }

    out.sort_by(|a, b| b.bytes.cmp(&a.bytes));

    if reconciliation.unmapped_significant {
        if let Some(top) = reconciliation.skipped_by_reason.first() {
            out.push(Recommendation {
                kind: RecommendationKind::Unmapped,
                title: format!("{} of used space is unaccounted for", format_size(reconciliation.unmapped_bytes)),
                detail: format!(
                    "{} path(s) skipped ({}). {}",
                    top.count,
                    top.reason.as_str(),
                    top.remediation
                ),
                bytes: reconciliation.unmapped_bytes,
                category: None,
                item_ids: Vec::new(),
            });
        }
    }

    out
}
