//! Wire protocol of the scan event stream.
//!
//! Every message is an [`EventEnvelope`]: a schema version, the scan id, a
//! per-scan sequence number and one [`ScanEvent`], tagged by `event`. Field
//! names are snake_case throughout.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::classifier::{Category, RiskLevel};
use crate::disk::DiskStats;
use crate::scanner::{SkipReason, SkippedItem, StaleProject, TreeNode};

use super::recommend::Recommendation;
use super::reconcile::Reconciliation;

/// Version of the event schema. Bumped on any incompatible field change.
pub const SCHEMA_VERSION: u32 = 1;

/// `days_since_used` when the last use time is unknown. Sorts as oldest.
pub const UNKNOWN_DAYS_SINCE_USED: u64 = 99_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Fast,
    Deep,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Fast => "fast",
            Phase::Deep => "deep",
        }
    }
}

/// One reclaimable unit as streamed to consumers and persisted in inventories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub category: Category,
    pub description: String,
    pub size_bytes: u64,
    pub size_formatted: String,
    pub file_count: u64,
    /// RFC 3339 timestamp, absent when unknown
    pub last_used: Option<String>,
    pub days_since_used: u64,
    pub risk: RiskLevel,
    pub confidence: f64,
    pub recovery_note: String,
    /// Part of the subtree could not be read; `size_bytes` is a lower bound
    #[serde(default)]
    pub incomplete: bool,
    pub phase: Phase,
}

/// Snapshot of scan progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub phase: Phase,
    pub current_path: Option<PathBuf>,
    pub files_processed: u64,
    pub bytes_scanned: u64,
    pub scan_rate_mbps: f64,
    /// Seconds since the scan started
    pub elapsed: f64,
    pub eta_seconds: Option<f64>,
    pub error_count: u64,
    pub last_error: Option<String>,
}

/// Non-fatal per-path problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub path: PathBuf,
    pub reason: SkipReason,
    pub remediation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&SkippedItem> for Warning {
    fn from(item: &SkippedItem) -> Self {
        Self {
            path: item.path.clone(),
            reason: item.reason,
            remediation: item.remediation.clone(),
            detail: item.detail.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: Category,
    pub size_bytes: u64,
    pub item_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub files_processed: u64,
    pub dirs_processed: u64,
    pub bytes_scanned: u64,
    pub items_found: usize,
    pub reclaimable_bytes: u64,
    pub safe_reclaimable_bytes: u64,
    pub fast_pass_seconds: f64,
    pub deep_pass_seconds: f64,
    pub total_seconds: f64,
    pub error_count: u64,
    pub skipped_count: usize,
    pub walker_threads: usize,
}

/// Payload of the `complete` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub root: PathBuf,
    pub items: Vec<ItemRecord>,
    /// Category → item tree; every parent equals the sum of its children
    pub full_tree: TreeNode,
    /// Size map of the scan root down to the configured depth
    pub disk_map: TreeNode,
    pub disk_total: u64,
    pub disk_used: u64,
    pub disk_free: u64,
    pub categories: Vec<CategorySummary>,
    pub metrics: Metrics,
    pub recommendations: Vec<Recommendation>,
    pub stale_projects: Vec<StaleProject>,
    pub skipped_items: Vec<SkippedItem>,
    pub reconciliation: Reconciliation,
}

impl ScanReport {
    pub fn disk(&self) -> DiskStats {
        DiskStats {
            total: self.disk_total,
            used: self.disk_used,
            free: self.disk_free,
            available: self.disk_free,
        }
    }
}

/// Events of one scan, in emission order: `start`, then items and progress
/// of the fast pass, `phase`, items and progress of the deep pass, and
/// exactly one terminal event (`complete`, `cancelled` or `error`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    Start {
        root: PathBuf,
        fast_pass: bool,
        started_at: String,
    },
    Phase {
        phase: Phase,
    },
    Progress(ScanProgress),
    Item(ItemRecord),
    Batch {
        items: Vec<ItemRecord>,
    },
    Warning(Warning),
    Complete(Box<ScanReport>),
    Cancelled {
        phase: Phase,
        items_found: usize,
        elapsed: f64,
    },
    Error {
        message: String,
    },
}

impl ScanEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ScanEvent::Start { .. } => "start",
            ScanEvent::Phase { .. } => "phase",
            ScanEvent::Progress(_) => "progress",
            ScanEvent::Item(_) => "item",
            ScanEvent::Batch { .. } => "batch",
            ScanEvent::Warning(_) => "warning",
            ScanEvent::Complete(_) => "complete",
            ScanEvent::Cancelled { .. } => "cancelled",
            ScanEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanEvent::Complete(_) | ScanEvent::Cancelled { .. } | ScanEvent::Error { .. }
        )
    }

    /// Items carried by an `item` or `batch` event.
    pub fn items(&self) -> &[ItemRecord] {
        match self {
            ScanEvent::Item(item) => std::slice::from_ref(item),
            ScanEvent::Batch { items } => items,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub schema_version: u32,
    pub scan_id: String,
    pub seq: u64,
    #[serde(flatten)]
    pub event: ScanEvent,
}

impl EventEnvelope {
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Stamps events with the scan id and a gapless sequence number and hands
/// them to a sink.
pub struct EventEmitter {
    scan_id: String,
    seq: u64,
    sink: Box<dyn FnMut(EventEnvelope) + Send>,
}

impl EventEmitter {
    pub fn new<F>(scan_id: impl Into<String>, sink: F) -> Self
    where
        F: FnMut(EventEnvelope) + Send + 'static,
    {
        Self {
            scan_id: scan_id.into(),
            seq: 0,
            sink: Box::new(sink),
        }
    }

    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    pub fn emit(&mut self, event: ScanEvent) {
        let envelope = EventEnvelope {
            schema_version: SCHEMA_VERSION,
            scan_id: self.scan_id.clone(),
            seq: self.seq,
            event,
        };
        self.seq += 1;
        (self.sink)(envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_is_flat_and_tagged() {
        let envelope = EventEnvelope {
            schema_version: SCHEMA_VERSION,
            scan_id: "scan-1".into(),
            seq: 3,
            event: ScanEvent::Phase { phase: Phase::Deep },
        };
        let value: serde_json::Value = serde_json::from_str(&envelope.to_json_line().unwrap()).unwrap();
        assert_eq!(value["schema_version"], 1);
        assert_eq!(value["event"], "phase");
        assert_eq!(value["phase"], "deep");
        assert_eq!(value["seq"], 3);
    }

    #[test]
    fn warning_event_fields() {
        let skipped = SkippedItem::new("/locked", SkipReason::PermissionDenied);
        let event = ScanEvent::Warning(Warning::from(&skipped));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "warning");
        assert_eq!(value["reason"], "permission_denied");
        assert_eq!(value["path"], "/locked");
        assert!(value["remediation"].as_str().unwrap().len() > 10);
        assert!(value.get("detail").is_none());
    }

    #[test]
    fn emitter_numbers_events_in_order() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut emitter = EventEmitter::new("scan-x", move |e| {
            let _ = tx.send(e);
        });
        emitter.emit(ScanEvent::Phase { phase: Phase::Fast });
        emitter.emit(ScanEvent::Error {
            message: "boom".into(),
        });

        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].seq, 0);
        assert_eq!(got[1].seq, 1);
        assert!(got[1].event.is_terminal());
        assert_eq!(got[1].event.name(), "error");
    }

    #[test]
    fn batch_items_accessor() {
        let event = ScanEvent::Batch { items: vec![] };
        assert!(event.items().is_empty());
        assert!(!event.is_terminal());
    }
}
