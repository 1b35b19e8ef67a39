//! Delete safety: scan, then delete against the scan's inventory

use std::fs;
use std::path::{Path, PathBuf};

use reclaimer::cleaner::DeleteStatus;
use reclaimer::config::{Config, DeleteMode};
use reclaimer::engine::{Inventory, ScanEngine, ScanEvent, ScanRequest};
use reclaimer::EngineError;
use tempfile::TempDir;

fn write_file(path: &Path, len: usize) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, vec![0u8; len]).unwrap();
}

fn scanned_engine(root: &Path) -> ScanEngine {
    let mut config = Config::default();
    config.locations.use_platform_defaults = false;
    config.scanner.threads = 2;
    config.delete.mode = DeleteMode::Permanent;
    config.delete.allowed_roots = vec![root.to_path_buf()];

    let engine = ScanEngine::new(config).unwrap();
    let events = engine.start_scan(ScanRequest::new(root)).unwrap().wait();
    assert!(matches!(
        events.last().map(|e| &e.event),
        Some(ScanEvent::Complete(_))
    ));
    engine
}

fn fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_file(&tmp.path().join(".npm/_cacache/a"), 3000);
    write_file(&tmp.path().join(".cache/pip/wheels/b"), 2000);
    write_file(&tmp.path().join(".cache/google-chrome/Default/c"), 1000);
    write_file(&tmp.path().join("projects/notes.txt"), 10);
    tmp
}

#[test]
fn outside_path_fails_while_siblings_succeed() {
    let tmp = fixture();
    let root = tmp.path().canonicalize().unwrap();
    let outside = TempDir::new().unwrap();
    write_file(&outside.path().join(".npm/x"), 10);

    let engine = scanned_engine(&root);
    let inventory = engine.inventory().unwrap();
    assert_eq!(inventory.items.len(), 3);

    let mut paths: Vec<PathBuf> = inventory.items.iter().map(|i| i.path.clone()).collect();
    paths.insert(1, outside.path().join(".npm"));

    let mut live = Vec::new();
    let report = engine
        .delete_with(&paths, false, Default::default(), |e| live.push(e.path.clone()))
        .unwrap();

    let statuses: Vec<_> = report.entries.iter().map(|e| e.status).collect();
    assert_eq!(statuses.iter().filter(|s| **s == DeleteStatus::Success).count(), 3);
    assert_eq!(statuses[1], DeleteStatus::Error);
    assert_eq!(live, paths);

    let expected: u64 = inventory.items.iter().map(|i| i.size_bytes).sum();
    assert_eq!(expected, 6000);
    assert_eq!(report.freed_bytes, expected);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, outside.path().join(".npm"));

    for item in &inventory.items {
        assert!(!item.path.exists(), "{} still exists", item.path.display());
    }
    assert!(outside.path().join(".npm/x").exists());
    assert!(root.join("projects/notes.txt").exists());
}

#[test]
fn unscanned_path_under_allowed_root_is_refused() {
    let tmp = fixture();
    let root = tmp.path().canonicalize().unwrap();
    let engine = scanned_engine(&root);

    let report = engine.delete(&[root.join("projects")], false).unwrap();
    assert_eq!(report.entries[0].status, DeleteStatus::Error);
    assert!(root.join("projects/notes.txt").exists());
}

#[test]
fn saved_inventory_gates_a_later_delete() {
    let tmp = fixture();
    let root = tmp.path().canonicalize().unwrap();
    let engine = scanned_engine(&root);

    let file = tmp.path().join("inventory.json");
    engine.inventory().unwrap().save(&file).unwrap();

    // a fresh engine, as in a separate process
    let mut config = engine.config().clone();
    config.delete.mode = DeleteMode::Permanent;
    let later = ScanEngine::new(config).unwrap();
    later.set_inventory(Inventory::load(&file).unwrap());

    let target = root.join(".cache/pip");
    let report = later.delete(&[target.clone()], true).unwrap();
    assert_eq!(report.freed_bytes, 2000);
    assert!(target.exists(), "dry run must not delete");

    let report = later.delete(&[target.clone()], false).unwrap();
    assert_eq!(report.deleted, vec![target.clone()]);
    assert!(!target.exists());
}

#[test]
fn batch_over_limit_is_rejected_whole() {
    let tmp = fixture();
    let root = tmp.path().canonicalize().unwrap();
    let engine = scanned_engine(&root);

    let paths: Vec<PathBuf> = (0..101).map(|i| root.join(format!("p{i}"))).collect();
    let err = engine.delete(&paths, false).unwrap_err();
    assert!(matches!(err, EngineError::BatchTooLarge { requested: 101, .. }));
    assert!(root.join(".npm").exists());
}
