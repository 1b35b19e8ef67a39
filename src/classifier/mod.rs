//! Path classification: maps a path and its metadata to a category, a
//! deletion risk level, a description and a confidence score.
//!
//! Classification is pure. The same `(path, metadata)` always yields the same
//! result, and no filesystem access happens here.

mod pattern;
mod rules;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scanner::{EntryKind, EntryMetadata};

pub use pattern::GlobPattern;
pub use rules::RuleTarget;

/// Closed set of reclaimable-space categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    BrowserCache,
    DevCache,
    AppCache,
    SystemLogs,
    MailBackups,
    GeneralCache,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::BrowserCache,
        Category::DevCache,
        Category::AppCache,
        Category::SystemLogs,
        Category::MailBackups,
        Category::GeneralCache,
    ];

    /// Wire identifier (`browser_cache`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::BrowserCache => "browser_cache",
            Category::DevCache => "dev_cache",
            Category::AppCache => "app_cache",
            Category::SystemLogs => "system_logs",
            Category::MailBackups => "mail_backups",
            Category::GeneralCache => "general_cache",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Category::BrowserCache => "Browser caches",
            Category::DevCache => "Developer caches",
            Category::AppCache => "Application caches",
            Category::SystemLogs => "Logs",
            Category::MailBackups => "Mail & device backups",
            Category::GeneralCache => "Other caches",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// Consequence of deleting an item. Ordered from least to most dangerous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Ephemeral; the owning application recreates it on demand.
    Safe,
    /// Recoverable, at the cost of re-downloads, rebuilds or lost state.
    Caution,
    /// System-adjacent. Excluded from bulk selection by default.
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Caution => "caution",
            RiskLevel::Critical => "critical",
        }
    }

    /// Default recovery note when a rule does not carry its own.
    pub fn default_recovery_note(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "Recreated automatically by the owning application on next use.",
            RiskLevel::Caution => {
                "Recoverable, but may require re-downloading packages, rebuilding or signing in again."
            }
            RiskLevel::Critical => {
                "System-managed data. Removal may affect system tools; restore from Trash if anything breaks."
            }
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "safe" => Ok(RiskLevel::Safe),
            "caution" => Ok(RiskLevel::Caution),
            "critical" => Ok(RiskLevel::Critical),
            _ => Err(format!("unknown risk level '{s}'")),
        }
    }
}

/// Result of classifying one path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub category: Category,
    pub risk: RiskLevel,
    pub description: String,
    pub recovery_note: String,
    /// Classifier certainty in `0.0..=1.0`.
    pub confidence: f64,
    /// Pattern of the rule that won.
    pub rule: String,
}

/// User-supplied rule, loaded from the `[classifier]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRule {
    pub pattern: String,
    pub category: Category,
    pub risk: RiskLevel,
    #[serde(default = "CustomRule::default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub recovery_note: Option<String>,
    #[serde(default)]
    pub target: RuleTarget,
}

impl CustomRule {
    fn default_confidence() -> f64 {
        0.8
    }
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: GlobPattern,
    target: RuleTarget,
    category: Category,
    risk: RiskLevel,
    confidence: f64,
    description: String,
    recovery_note: Option<String>,
}

impl Rule {
    fn applies_to(&self, kind: EntryKind) -> bool {
        match (self.target, kind) {
            (_, EntryKind::Symlink | EntryKind::Other) => false,
            (RuleTarget::Any, _) => true,
            (RuleTarget::Dir, EntryKind::Dir) => true,
            (RuleTarget::File, EntryKind::File) => true,
            _ => false,
        }
    }
}

/// Rule-table classifier.
///
/// When several rules match, the most specific pattern wins; equal
/// specificity is broken towards the higher risk level, then towards the
/// earlier rule in the table.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    rules: Vec<Rule>,
    set: RegexSet,
}

impl PathClassifier {
    /// Classifier with only the built-in rule table.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::with_custom_rules(&[])
    }

    /// Built-in rules plus custom rules. Custom rules are evaluated first, so
    /// they win specificity ties against built-ins of equal risk.
    pub fn with_custom_rules(custom: &[CustomRule]) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(custom.len() + rules::BUILTIN_RULES.len());

        for rule in custom {
            let pattern = GlobPattern::new(&rule.pattern).map_err(|e| {
                ConfigError::Invalid(format!("bad classifier pattern '{}': {e}", rule.pattern))
            })?;
            if !(0.0..=1.0).contains(&rule.confidence) {
                return Err(ConfigError::Invalid(format!(
                    "confidence for '{}' must be within 0-1",
                    rule.pattern
                )));
            }
            rules.push(Rule {
                pattern,
                target: rule.target,
                category: rule.category,
                risk: rule.risk,
                confidence: rule.confidence,
                description: rule
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("{}: {{name}}", rule.category.label())),
                recovery_note: rule.recovery_note.clone(),
            });
        }

        for spec in rules::BUILTIN_RULES {
            let pattern = GlobPattern::new(spec.pattern).map_err(|e| {
                ConfigError::Invalid(format!("bad built-in pattern '{}': {e}", spec.pattern))
            })?;
            rules.push(Rule {
                pattern,
                target: spec.target,
                category: spec.category,
                risk: spec.risk,
                confidence: spec.confidence,
                description: spec.description.to_string(),
                recovery_note: spec.recovery_note.map(str::to_string),
            });
        }

        let set = RegexSet::new(rules.iter().map(|r| r.pattern.regex_source()))
            .map_err(|e| ConfigError::Invalid(format!("classifier rule set: {e}")))?;

        Ok(Self { rules, set })
    }

    /// Number of rules loaded.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Classify a path. Returns `None` when the path is not a reclaimable unit.
    pub fn classify(&self, path: &Path, metadata: &EntryMetadata) -> Option<Classification> {
        let path_str = path.to_string_lossy();

        let winner = self
            .set
            .matches(&path_str)
            .into_iter()
            .map(|idx| (idx, &self.rules[idx]))
            .filter(|(_, rule)| rule.applies_to(metadata.kind))
            .max_by(|(ia, a), (ib, b)| {
                a.pattern
                    .specificity()
                    .cmp(&b.pattern.specificity())
                    .then(a.risk.cmp(&b.risk))
                    .then(ib.cmp(ia))
            })
            .map(|(_, rule)| rule)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path_str.to_string());

        Some(Classification {
            category: winner.category,
            risk: winner.risk,
            description: winner.description.replace("{name}", &name),
            recovery_note: winner
                .recovery_note
                .clone()
                .unwrap_or_else(|| winner.risk.default_recovery_note().to_string()),
            confidence: winner.confidence,
            rule: winner.pattern.as_str().to_string(),
        })
    }
}
