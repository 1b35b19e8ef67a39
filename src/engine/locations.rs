//! Well-known cache and log locations visited by the fast pass.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::classifier::{Category, Classification, RiskLevel};
use crate::config::{expand_home, LocationUnit, LocationsConfig};
use crate::scanner::WalkRoot;

/// Classification for entries of a location that no rule recognises.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fallback {
    pub category: Category,
    pub risk: RiskLevel,
    pub confidence: f64,
}

impl Fallback {
    /// Used for locations the user listed explicitly.
    pub const USER_LISTED: Fallback = Fallback {
        category: Category::GeneralCache,
        risk: RiskLevel::Caution,
        confidence: 0.4,
    };

    pub fn classify(&self, path: &Path) -> Classification {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Classification {
            category: self.category,
            risk: self.risk,
            description: format!("{}: {}", self.category.label(), name),
            recovery_note: self.risk.default_recovery_note().to_string(),
            confidence: self.confidence,
            rule: "location".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FastLocation {
    pub path: PathBuf,
    pub unit: LocationUnit,
    pub fallback: Option<Fallback>,
}

impl FastLocation {
    pub fn walk_root(&self) -> WalkRoot {
        match self.unit {
            LocationUnit::Whole => WalkRoot::whole(&self.path),
            LocationUnit::Children => WalkRoot::children(&self.path),
        }
    }
}

#[cfg(target_os = "macos")]
const PLATFORM_DEFAULTS: &[(&str, LocationUnit)] = &[
    ("~/Library/Caches", LocationUnit::Children),
    ("~/Library/Logs", LocationUnit::Children),
    ("~/Library/Developer/Xcode/DerivedData", LocationUnit::Whole),
    ("~/Library/Developer/Xcode/iOS DeviceSupport", LocationUnit::Whole),
    ("~/Library/Developer/CoreSimulator/Caches", LocationUnit::Whole),
    ("~/Library/Application Support/MobileSync/Backup", LocationUnit::Whole),
    ("~/.npm", LocationUnit::Whole),
    ("~/.cargo/registry/cache", LocationUnit::Whole),
    ("~/.gradle/caches", LocationUnit::Whole),
    ("~/.m2/repository", LocationUnit::Whole),
];

#[cfg(not(target_os = "macos"))]
const PLATFORM_DEFAULTS: &[(&str, LocationUnit)] = &[
    ("~/.cache", LocationUnit::Children),
    ("~/.npm", LocationUnit::Whole),
    ("~/.cargo/registry/cache", LocationUnit::Whole),
    ("~/.cargo/registry/src", LocationUnit::Whole),
    ("~/.gradle/caches", LocationUnit::Whole),
    ("~/.m2/repository", LocationUnit::Whole),
    ("~/.local/share/pnpm/store", LocationUnit::Whole),
    ("/var/log", LocationUnit::Children),
    ("/tmp", LocationUnit::Children),
    ("/var/tmp", LocationUnit::Children),
];

/// Built-in locations for the current platform.
pub fn platform_defaults() -> Vec<FastLocation> {
    PLATFORM_DEFAULTS
        .iter()
        .map(|(path, unit)| FastLocation {
            path: expand_home(path),
            unit: *unit,
            fallback: None,
        })
        .collect()
}

/// The fast-pass table: platform defaults (unless disabled) followed by
/// configured locations. Duplicate paths keep their first entry.
pub fn resolve(config: &LocationsConfig) -> Vec<FastLocation> {
    let mut locations = if config.use_platform_defaults {
        platform_defaults()
    } else {
        Vec::new()
    };

    for entry in &config.fast_pass {
        locations.push(FastLocation {
            path: expand_home(&entry.path),
            unit: entry.unit,
            fallback: Some(Fallback::USER_LISTED),
        });
    }

    let mut seen = HashSet::new();
    locations.retain(|loc| seen.insert(loc.path.clone()));
    locations
}

/// The locations that can contribute items to a scan of `root`, with their
/// paths canonicalized. `root` must be canonical.
///
/// Locations outside `root` and locations that do not exist are dropped. A
/// location that equals or contains `root` is dropped as well, since its unit
/// would swallow the root and overlap every item of the deep pass. The one
/// exception is a children location at `root` itself, whose units are the
/// root's children.
pub fn within_root(locations: &[FastLocation], root: &Path) -> Vec<FastLocation> {
    let mut seen = HashSet::new();
    locations
        .iter()
        .filter_map(|loc| {
            let path = loc.path.canonicalize().ok()?;
            let inside = path.starts_with(root) && (path != root || loc.unit == LocationUnit::Children);
            if !inside {
                tracing::debug!(location = %loc.path.display(), root = %root.display(), "location out of scan scope");
                return None;
            }
            seen.insert(path.clone()).then(|| FastLocation {
                path,
                unit: loc.unit,
                fallback: loc.fallback,
            })
        })
        .collect()
}

/// Drops locations nested inside another one so no two fast-pass units
/// overlap. The outer location reports the nested path as part of its own
/// units.
pub fn outermost(locations: &[FastLocation]) -> Vec<FastLocation> {
    locations
        .iter()
        .filter(|loc| {
            !locations
                .iter()
                .any(|other| other.path != loc.path && loc.path.starts_with(&other.path))
        })
        .cloned()
        .collect()
}
