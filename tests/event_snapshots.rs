//! Snapshot tests for the wire encoding of scan events.
//!
//! Any change to these lines is a protocol change and needs a schema
//! version bump. Review with `cargo insta review`.

use insta::assert_snapshot;
use reclaimer::classifier::{Category, RiskLevel};
use reclaimer::engine::{EventEnvelope, ItemRecord, Phase, ScanEvent, SCHEMA_VERSION};
use reclaimer::scanner::{SkipReason, SkippedItem};
use std::path::PathBuf;

fn envelope(seq: u64, event: ScanEvent) -> String {
    EventEnvelope {
        schema_version: SCHEMA_VERSION,
        scan_id: "scan-1".to_string(),
        seq,
        event,
    }
    .to_json_line()
    .unwrap()
}

#[test]
fn item_event_snapshot() {
    let item = ItemRecord {
        id: "item-1".to_string(),
        name: ".npm".to_string(),
        path: PathBuf::from("/home/u/.npm"),
        category: Category::DevCache,
        description: "npm package cache".to_string(),
        size_bytes: 1536,
        size_formatted: "1.50 KB".to_string(),
        file_count: 2,
        last_used: None,
        days_since_used: 99_999,
        risk: RiskLevel::Caution,
        confidence: 0.9,
        recovery_note: "Re-downloaded on next install.".to_string(),
        incomplete: false,
        phase: Phase::Fast,
    };

    assert_snapshot!(envelope(3, ScanEvent::Item(item)), @r#"{"schema_version":1,"scan_id":"scan-1","seq":3,"event":"item","id":"item-1","name":".npm","path":"/home/u/.npm","category":"dev_cache","description":"npm package cache","size_bytes":1536,"size_formatted":"1.50 KB","file_count":2,"last_used":null,"days_since_used":99999,"risk":"caution","confidence":0.9,"recovery_note":"Re-downloaded on next install.","incomplete":false,"phase":"fast"}"#);
}

#[test]
fn control_event_snapshots() {
    assert_snapshot!(
        envelope(7, ScanEvent::Phase { phase: Phase::Deep }),
        @r#"{"schema_version":1,"scan_id":"scan-1","seq":7,"event":"phase","phase":"deep"}"#
    );
    assert_snapshot!(
        envelope(
            9,
            ScanEvent::Cancelled {
                phase: Phase::Deep,
                items_found: 2,
                elapsed: 1.5,
            }
        ),
        @r#"{"schema_version":1,"scan_id":"scan-1","seq":9,"event":"cancelled","phase":"deep","items_found":2,"elapsed":1.5}"#
    );
    assert_snapshot!(
        envelope(1, ScanEvent::Error { message: "Path not found: /x".to_string() }),
        @r#"{"schema_version":1,"scan_id":"scan-1","seq":1,"event":"error","message":"Path not found: /x"}"#
    );
}

#[test]
fn warning_event_snapshot() {
    let skipped = SkippedItem::new("/var/lib/private", SkipReason::PermissionDenied);
    let line = envelope(4, ScanEvent::Warning((&skipped).into()));
    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["event"], "warning");
    assert_eq!(value["reason"], "permission_denied");
    assert!(value["remediation"].as_str().is_some_and(|r| !r.is_empty()));
    assert!(value.get("detail").is_none());
}

#[test]
fn envelopes_decode_back() {
    let line = envelope(2, ScanEvent::Batch { items: vec![] });
    let decoded: EventEnvelope = serde_json::from_str(&line).unwrap();
    assert_eq!(decoded.seq, 2);
    assert_eq!(decoded.event, ScanEvent::Batch { items: vec![] });
}
