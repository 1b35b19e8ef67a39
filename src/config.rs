use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classifier::{CustomRule, PathClassifier};
use crate::error::ConfigError;

/// Hard ceiling on paths per delete request.
pub const MAX_DELETE_BATCH: usize = 100;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scanner: ScannerConfig,
    pub locations: LocationsConfig,
    pub classifier: ClassifierConfig,
    pub delete: DeleteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Number of walker threads (0 = one per logical core)
    pub threads: usize,
    /// Maximum recursion depth of the deep pass
    pub max_depth: usize,
    /// Follow symbolic links
    pub follow_symlinks: bool,
    /// Stay on the root's filesystem
    pub one_file_system: bool,
    /// A stat slower than this skips the path
    pub stat_timeout_ms: u64,
    /// Emit a progress event at least every N files
    pub progress_every_files: u64,
    /// Emit a progress event at least this often
    pub progress_interval_ms: u64,
    /// Items per `batch` event (1 = individual `item` events)
    pub batch_size: usize,
    /// Depth of the disk map below the scan root
    pub disk_map_depth: usize,
    /// Scan root when none is given (home directory if unset)
    pub default_root: Option<PathBuf>,
}

/// How a fast-pass location is turned into items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationUnit {
    /// The location itself is one item
    Whole,
    /// Each direct child of the location is an item
    Children,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationEntry {
    /// Directory to visit; a leading `~` expands to the home directory
    pub path: String,
    #[serde(default = "default_unit")]
    pub unit: LocationUnit,
}

fn default_unit() -> LocationUnit {
    LocationUnit::Children
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationsConfig {
    /// Include the built-in location table for this platform
    pub use_platform_defaults: bool,
    /// Additional fast-pass locations
    pub fast_pass: Vec<LocationEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Rules evaluated alongside the built-in table
    pub rules: Vec<CustomRule>,
    /// Projects untouched for this many days are reported (0 disables)
    pub stale_project_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Move to the platform trash
    Trash,
    /// Unlink
    Permanent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteConfig {
    /// Maximum paths per delete request
    pub max_batch: usize,
    pub mode: DeleteMode,
    /// Nothing outside these prefixes is ever deleted (empty = home and temp dir)
    pub allowed_roots: Vec<PathBuf>,
    /// Permit deleting items classified critical
    pub allow_critical: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            max_depth: 64,
            follow_symlinks: false,
            one_file_system: true,
            stat_timeout_ms: 3000,
            progress_every_files: 500,
            progress_interval_ms: 250,
            batch_size: 16,
            disk_map_depth: 2,
            default_root: None,
        }
    }
}

impl Default for LocationsConfig {
    fn default() -> Self {
        Self {
            use_platform_defaults: true,
            fast_pass: vec![],
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rules: vec![],
            stale_project_days: 90,
        }
    }
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            max_batch: MAX_DELETE_BATCH,
            mode: DeleteMode::Trash,
            allowed_roots: vec![],
            allow_critical: false,
        }
    }
}

impl ScannerConfig {
    /// Configured root, falling back to the home directory, then `/`.
    pub fn resolve_root(&self) -> PathBuf {
        self.default_root
            .as_deref()
            .map(expand_home)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("/"))
    }
}

impl DeleteConfig {
    /// Allowed roots with `~` expanded; defaults apply when none are configured.
    pub fn effective_allowed_roots(&self) -> Vec<PathBuf> {
        if !self.allowed_roots.is_empty() {
            return self.allowed_roots.iter().map(|p| expand_home(p)).collect();
        }
        let mut roots: Vec<PathBuf> = dirs::home_dir().into_iter().collect();
        roots.push(std::env::temp_dir());
        roots
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("reclaimer").join("config.toml"))
    }

    /// Load configuration. An explicit path must exist; otherwise the
    /// default location is used if present, else built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => {
                    tracing::debug!("no config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadError {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|err| match err {
            ConfigError::ParseError { source, .. } => ConfigError::ParseError {
                path: path.clone(),
                source,
            },
            other => other,
        })?;

        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_DELETE_BATCH).contains(&self.delete.max_batch) {
            return Err(ConfigError::Invalid(format!(
                "delete.max_batch must be between 1 and {MAX_DELETE_BATCH}, got {}",
                self.delete.max_batch
            )));
        }
        if self.scanner.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "scanner.batch_size must be at least 1".to_string(),
            ));
        }
        if self.scanner.disk_map_depth > 8 {
            return Err(ConfigError::Invalid(format!(
                "scanner.disk_map_depth must be at most 8, got {}",
                self.scanner.disk_map_depth
            )));
        }
        if self.scanner.max_depth == 0 {
            return Err(ConfigError::Invalid(
                "scanner.max_depth must be at least 1".to_string(),
            ));
        }
        if self.scanner.stat_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "scanner.stat_timeout_ms must be positive".to_string(),
            ));
        }
        // compiles the rules, which also range-checks confidences
        PathClassifier::with_custom_rules(&self.classifier.rules)?;
        Ok(())
    }

    /// Classifier with the configured custom rules ahead of the built-ins.
    pub fn classifier(&self) -> Result<PathClassifier, ConfigError> {
        PathClassifier::with_custom_rules(&self.classifier.rules)
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.delete.max_batch, 100);
        assert_eq!(config.delete.mode, DeleteMode::Trash);
        assert_eq!(config.scanner.stat_timeout_ms, 3000);
    }

    #[test]
    fn config_serializes_to_toml() {
        let toml_str = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(toml_str.contains("[scanner]"));
        assert!(toml_str.contains("[delete]"));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [scanner]
            threads = 2

            [[locations.fast_pass]]
            path = "~/scratch"
            unit = "whole"
            "#,
        )
        .unwrap();
        assert_eq!(config.scanner.threads, 2);
        assert_eq!(config.scanner.max_depth, 64);
        assert_eq!(config.locations.fast_pass[0].unit, LocationUnit::Whole);
        assert!(config.locations.use_platform_defaults);
    }

    #[test]
    fn location_unit_defaults_to_children() {
        let config = Config::from_toml("[[locations.fast_pass]]\npath = \"/data/cache\"\n").unwrap();
        assert_eq!(config.locations.fast_pass[0].unit, LocationUnit::Children);
    }

    #[test]
    fn rejects_oversized_batch() {
        let err = Config::from_toml("[delete]\nmax_batch = 500\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("max_batch")));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let err = Config::from_toml("[scanner]\nbatch_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_rule_confidence() {
        let err = Config::from_toml(
            r#"
            [[classifier.rules]]
            pattern = "**/scratch"
            category = "general_cache"
            risk = "safe"
            confidence = 1.5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn parse_error_is_reported() {
        let err = Config::from_toml("[scanner\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn expand_home_handles_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home("~/x"), home.join("x"));
        assert_eq!(expand_home("/abs/x"), PathBuf::from("/abs/x"));
    }

    #[test]
    fn default_allowed_roots_include_temp() {
        let roots = DeleteConfig::default().effective_allowed_roots();
        assert!(roots.contains(&std::env::temp_dir()));
    }
}
