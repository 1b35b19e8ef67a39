//! Detection of software projects whose build artifacts have gone stale.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// A kind of software project, recognised by marker files in its root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectKind {
    /// Unique identifier (e.g., "cargo")
    pub id: &'static str,
    /// Human-readable name (e.g., "Rust/Cargo")
    pub display_name: &'static str,
    /// File names that mark a project root. A leading `*` matches by suffix.
    pub markers: &'static [&'static str],
    /// Directories holding regenerable build output
    pub artifact_dirs: &'static [&'static str],
}

impl ProjectKind {
    fn marker_in(&self, child_names: &[String]) -> Option<String> {
        child_names
            .iter()
            .find(|name| {
                self.markers.iter().any(|marker| match marker.strip_prefix('*') {
                    Some(suffix) => name.ends_with(suffix),
                    None => name.as_str() == *marker,
                })
            })
            .cloned()
    }

    fn artifacts_in(&self, child_names: &[String]) -> Vec<&'static str> {
        self.artifact_dirs
            .iter()
            .copied()
            .filter(|dir| child_names.iter().any(|n| n == dir))
            .collect()
    }
}

pub const PROJECT_KINDS: &[ProjectKind] = &[
    ProjectKind {
        id: "cargo",
        display_name: "Rust/Cargo",
        markers: &["Cargo.toml"],
        artifact_dirs: &["target"],
    },
    ProjectKind {
        id: "npm",
        display_name: "Node.js/npm",
        markers: &["package.json"],
        artifact_dirs: &["node_modules", ".next", ".nuxt", ".parcel-cache"],
    },
    ProjectKind {
        id: "gradle",
        display_name: "Gradle",
        markers: &["build.gradle", "build.gradle.kts", "settings.gradle", "settings.gradle.kts"],
        artifact_dirs: &["build", ".gradle"],
    },
    ProjectKind {
        id: "maven",
        display_name: "Maven",
        markers: &["pom.xml"],
        artifact_dirs: &["target"],
    },
    ProjectKind {
        id: "python",
        display_name: "Python",
        markers: &["pyproject.toml", "setup.py", "requirements.txt"],
        artifact_dirs: &[".venv", "venv", "__pycache__", ".pytest_cache", ".mypy_cache", ".tox"],
    },
    ProjectKind {
        id: "cmake",
        display_name: "CMake",
        markers: &["CMakeLists.txt"],
        artifact_dirs: &["build", "cmake-build-debug", "cmake-build-release"],
    },
    ProjectKind {
        id: "bazel",
        display_name: "Bazel",
        markers: &["MODULE.bazel", "WORKSPACE", "WORKSPACE.bazel"],
        artifact_dirs: &["bazel-bin", "bazel-out", "bazel-testlogs"],
    },
    ProjectKind {
        id: "dotnet",
        display_name: ".NET",
        markers: &["*.csproj", "*.fsproj", "*.sln"],
        artifact_dirs: &["bin", "obj"],
    },
];

/// A project detected in a directory listing, before age is considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedProject {
    pub path: PathBuf,
    pub kind: &'static ProjectKind,
    /// Marker file that identified the project
    pub marker: PathBuf,
    pub artifact_paths: Vec<PathBuf>,
}

/// Identify the first project kind whose marker appears in `child_names`
/// and which has at least one artifact directory present.
pub fn detect(dir: &Path, child_names: &[String]) -> Option<DetectedProject> {
    PROJECT_KINDS.iter().find_map(|kind| {
        let marker = kind.marker_in(child_names)?;
        let artifacts = kind.artifacts_in(child_names);
        if artifacts.is_empty() {
            return None;
        }
        Some(DetectedProject {
            path: dir.to_path_buf(),
            kind,
            marker: dir.join(marker),
            artifact_paths: artifacts.into_iter().map(|a| dir.join(a)).collect(),
        })
    })
}

/// A project untouched for longer than the staleness threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleProject {
    pub path: PathBuf,
    pub project_type: String,
    pub display_name: String,
    pub artifact_paths: Vec<PathBuf>,
    pub artifact_bytes: u64,
    pub days_since_modified: u64,
}

/// Whole days between `then` and `now`; `None` if `then` is in the future.
pub fn days_between(then: SystemTime, now: SystemTime) -> Option<u64> {
    now.duration_since(then).ok().map(|d| d.as_secs() / 86_400)
}

/// Returns the age of the project if it is older than `stale_after`.
pub fn stale_age(
    last_modified: Option<SystemTime>,
    now: SystemTime,
    stale_after: Duration,
) -> Option<u64> {
    let age = now.duration_since(last_modified?).ok()?;
    (age >= stale_after).then(|| age.as_secs() / 86_400)
}
