//! Benchmarks for classification and the parallel walker

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reclaimer::classifier::PathClassifier;
use reclaimer::scanner::{
    CancelToken, DirectoryWalker, EntryMetadata, ScanOptions, SizeAccumulator, WalkEvent, WalkRoot,
};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Create a benchmark directory with the given number of files and directories,
/// plus one npm cache per directory for the classifier to find.
fn create_benchmark_dir(file_count: usize, dir_count: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    let files_per_dir = file_count / dir_count.max(1);

    for d in 0..dir_count {
        let subdir = root.join(format!("dir{}", d));
        fs::create_dir_all(subdir.join(".npm/_cacache")).unwrap();
        fs::write(subdir.join(".npm/_cacache/blob"), vec![b'c'; 4096]).unwrap();

        for f in 0..files_per_dir {
            let mut file = File::create(subdir.join(format!("file{}.txt", f))).unwrap();
            file.write_all(&vec![b'x'; 1024]).unwrap();
        }
    }

    dir
}

fn sample_paths() -> Vec<PathBuf> {
    [
        "/home/u/.npm",
        "/home/u/.cache/google-chrome",
        "/home/u/.cache/pip",
        "/home/u/projects/app/node_modules",
        "/home/u/projects/app/target",
        "/home/u/Documents/report.pdf",
        "/home/u/.local/share/Trash",
        "/var/log/syslog.1",
        "/etc/passwd",
        "/home/u/projects/app/src/main.rs",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

fn benchmark_classify(c: &mut Criterion) {
    let classifier = PathClassifier::builtin().unwrap();
    let paths = sample_paths();
    let dir = EntryMetadata::dir();

    c.bench_function("classify_mixed_paths", |b| {
        b.iter(|| {
            paths
                .iter()
                .filter(|p| classifier.classify(black_box(p), &dir).is_some())
                .count()
        })
    });
}

fn walk_all(root: &Path, options: &ScanOptions, prune: bool) -> usize {
    let cancel = CancelToken::new();
    let accumulator = Arc::new(SizeAccumulator::new(cancel.clone()));
    let mut walker = DirectoryWalker::new(options.clone(), accumulator, cancel);
    if prune {
        let classifier = Arc::new(PathClassifier::builtin().unwrap());
        walker = walker.with_prune(move |path, meta| classifier.classify(path, meta).is_some());
    }

    let events = walker.walk(&[WalkRoot::deep(root, options.max_depth)]).unwrap();
    events
        .iter()
        .filter(|e| matches!(e, WalkEvent::Entry(_)))
        .count()
}

fn benchmark_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("walk");

    for size in [100, 500, 1000].iter() {
        let dir = create_benchmark_dir(*size, 10);

        let single = ScanOptions::new().with_threads(1);
        let parallel = ScanOptions::new();

        group.bench_with_input(BenchmarkId::new("single_worker", size), size, |b, _| {
            b.iter(|| walk_all(black_box(dir.path()), &single, false))
        });

        group.bench_with_input(BenchmarkId::new("parallel", size), size, |b, _| {
            b.iter(|| walk_all(black_box(dir.path()), &parallel, false))
        });

        group.bench_with_input(BenchmarkId::new("parallel_pruned", size), size, |b, _| {
            b.iter(|| walk_all(black_box(dir.path()), &parallel, true))
        });
    }

    group.finish();
}

fn benchmark_subtree_size(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();

    // 5 levels deep with 10 files each
    let mut current = dir.path().to_path_buf();
    for level in 0..5 {
        current = current.join(format!("level{}", level));
        fs::create_dir(&current).unwrap();

        for f in 0..10 {
            let mut file = File::create(current.join(format!("file{}.txt", f))).unwrap();
            file.write_all(&vec![b'z'; 512]).unwrap();
        }
    }

    // a fresh accumulator each round so the cache does not short-circuit the walk
    c.bench_function("subtree_size_uncached", |b| {
        b.iter(|| SizeAccumulator::new(CancelToken::new()).size_of(black_box(dir.path())))
    });
}

criterion_group!(
    benches,
    benchmark_classify,
    benchmark_walk,
    benchmark_subtree_size
);
criterion_main!(benches);
