//! Built-in classification rule table.
//!
//! Exact, well-known locations carry confidence close to 1.0; generic
//! "anything under a cache root" rules sit around 0.5-0.6. `{name}` in a
//! description is replaced by the matched entry's file name.

use serde::{Deserialize, Serialize};

use super::{Category, RiskLevel};

/// Which entry kinds a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTarget {
    #[default]
    Dir,
    File,
    Any,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RuleSpec {
    pub pattern: &'static str,
    pub target: RuleTarget,
    pub category: Category,
    pub risk: RiskLevel,
    pub confidence: f64,
    pub description: &'static str,
    pub recovery_note: Option<&'static str>,
}

const fn dir(
    pattern: &'static str,
    category: Category,
    risk: RiskLevel,
    confidence: f64,
    description: &'static str,
) -> RuleSpec {
    RuleSpec {
        pattern,
        target: RuleTarget::Dir,
        category,
        risk,
        confidence,
        description,
        recovery_note: None,
    }
}

const fn file(
    pattern: &'static str,
    category: Category,
    risk: RiskLevel,
    confidence: f64,
    description: &'static str,
) -> RuleSpec {
    RuleSpec {
        pattern,
        target: RuleTarget::File,
        category,
        risk,
        confidence,
        description,
        recovery_note: None,
    }
}

const fn with_note(mut spec: RuleSpec, note: &'static str) -> RuleSpec {
    spec.recovery_note = Some(note);
    spec
}

use Category::*;
use RiskLevel::*;

pub(crate) const BUILTIN_RULES: &[RuleSpec] = &[
    // Browsers
    dir("**/.cache/mozilla", BrowserCache, Safe, 0.95, "Firefox cache"),
    dir("**/.cache/google-chrome", BrowserCache, Safe, 0.95, "Google Chrome cache"),
    dir("**/.cache/chromium", BrowserCache, Safe, 0.95, "Chromium cache"),
    dir("**/.cache/BraveSoftware", BrowserCache, Safe, 0.9, "Brave cache"),
    dir("**/.cache/vivaldi", BrowserCache, Safe, 0.9, "Vivaldi cache"),
    dir("**/.cache/microsoft-edge", BrowserCache, Safe, 0.9, "Microsoft Edge cache"),
    dir("**/Library/Caches/Google/Chrome", BrowserCache, Safe, 0.95, "Google Chrome cache"),
    dir("**/Library/Caches/com.apple.Safari", BrowserCache, Safe, 0.95, "Safari cache"),
    dir("**/Library/Caches/Firefox", BrowserCache, Safe, 0.95, "Firefox cache"),
    dir("**/Library/Caches/Microsoft Edge", BrowserCache, Safe, 0.9, "Microsoft Edge cache"),
    dir("**/Library/Caches/BraveSoftware", BrowserCache, Safe, 0.9, "Brave cache"),
    // Package managers, build tools, IDEs
    dir("**/.npm", DevCache, Caution, 0.9, "npm package cache"),
    dir("**/.cache/yarn", DevCache, Caution, 0.95, "Yarn package cache"),
    dir("**/.cache/pnpm", DevCache, Caution, 0.9, "pnpm package cache"),
    dir("**/.local/share/pnpm/store", DevCache, Caution, 0.9, "pnpm content-addressable store"),
    dir("**/.cache/pip", DevCache, Caution, 0.95, "pip download cache"),
    dir("**/.cache/pypoetry", DevCache, Caution, 0.9, "Poetry cache"),
    dir("**/.cache/go-build", DevCache, Caution, 0.95, "Go build cache"),
    dir("**/go/pkg/mod/cache", DevCache, Caution, 0.85, "Go module download cache"),
    dir("**/.cargo/registry/cache", DevCache, Caution, 0.95, "Cargo crate archive cache"),
    dir("**/.cargo/registry/src", DevCache, Caution, 0.9, "Cargo extracted crate sources"),
    dir("**/.gradle/caches", DevCache, Caution, 0.95, "Gradle dependency and build cache"),
    dir("**/.gradle/wrapper/dists", DevCache, Caution, 0.9, "Gradle wrapper distributions"),
    dir("**/.m2/repository", DevCache, Caution, 0.85, "Maven local repository"),
    dir("**/.cache/JetBrains", DevCache, Caution, 0.9, "JetBrains IDE caches and indexes"),
    dir("**/.cache/bazel", DevCache, Caution, 0.9, "Bazel output cache"),
    dir("**/.ccache", DevCache, Caution, 0.9, "ccache compiler cache"),
    dir("**/.cache/ccache", DevCache, Caution, 0.9, "ccache compiler cache"),
    dir("**/.cache/node-gyp", DevCache, Caution, 0.95, "node-gyp headers cache"),
    dir("**/.cache/composer", DevCache, Caution, 0.9, "Composer package cache"),
    dir("**/.cache/electron", DevCache, Caution, 0.9, "Electron binaries cache"),
    dir("**/.cache/typescript", DevCache, Caution, 0.9, "TypeScript typings cache"),
    dir("**/.config/Code/CachedExtensionVSIXs", DevCache, Caution, 0.85, "VS Code cached extension packages"),
    dir("**/Library/Developer/Xcode/DerivedData", DevCache, Caution, 0.98, "Xcode derived data"),
    dir("**/Library/Developer/Xcode/iOS DeviceSupport", DevCache, Caution, 0.9, "Xcode device support files"),
    dir("**/Library/Developer/CoreSimulator/Caches", DevCache, Caution, 0.9, "iOS simulator caches"),
    dir("**/Library/Caches/Homebrew", DevCache, Caution, 0.95, "Homebrew download cache"),
    dir("**/Library/Caches/CocoaPods", DevCache, Caution, 0.95, "CocoaPods cache"),
    dir("**/Library/Caches/pip", DevCache, Caution, 0.95, "pip download cache"),
    dir("**/Library/Caches/Yarn", DevCache, Caution, 0.95, "Yarn package cache"),
    // Application caches
    dir("**/.cache/thumbnails", AppCache, Safe, 0.95, "Thumbnail cache"),
    dir("**/.cache/fontconfig", AppCache, Safe, 0.9, "Font cache"),
    dir("**/.cache/mesa_shader_cache", AppCache, Safe, 0.9, "GPU shader cache"),
    dir("**/.var/app/*/cache", AppCache, Safe, 0.8, "Flatpak app cache for {name}"),
    dir("**/snap/*/common/.cache", AppCache, Safe, 0.75, "Snap app cache"),
    dir("**/.config/*/Cache", AppCache, Safe, 0.55, "Application web cache"),
    dir("**/.config/*/Code Cache", AppCache, Safe, 0.55, "Application script cache"),
    dir("**/.config/*/GPUCache", AppCache, Safe, 0.55, "Application GPU cache"),
    dir("**/.config/*/CachedData", AppCache, Safe, 0.5, "Application cached data"),
    dir("**/Library/Caches/*", AppCache, Safe, 0.6, "Application cache: {name}"),
    dir("**/Library/Caches/com.apple.*", AppCache, Critical, 0.5, "System component cache: {name}"),
    // Logs
    dir("**/Library/Logs/*", SystemLogs, Safe, 0.7, "Application logs: {name}"),
    dir("**/Library/Logs/DiagnosticReports", SystemLogs, Safe, 0.9, "Crash and diagnostic reports"),
    file("**/.xsession-errors.old", SystemLogs, Safe, 0.9, "Previous X session error log"),
    dir("/var/log/journal", SystemLogs, Critical, 0.9, "systemd journal"),
    file("/var/log/**/*.gz", SystemLogs, Caution, 0.85, "Rotated, compressed log"),
    file("/var/log/**/*.[0-9]", SystemLogs, Caution, 0.8, "Rotated log"),
    file("/var/log/**/*.old", SystemLogs, Caution, 0.75, "Rotated log"),
    file("/var/crash/*.crash", SystemLogs, Caution, 0.85, "Crash dump"),
    dir("/private/var/log/asl", SystemLogs, Critical, 0.85, "Apple system log store"),
    // Mail and device backups
    with_note(
        dir("**/Library/Application Support/MobileSync/Backup", MailBackups, Caution, 0.95, "iOS device backups"),
        "Backups cannot be recreated; make sure a newer backup exists before deleting.",
    ),
    dir("**/Library/Containers/com.apple.mail/Data/Library/Mail Downloads", MailBackups, Safe, 0.95, "Mail attachment downloads"),
    with_note(
        dir("**/.thunderbird/*/ImapMail", MailBackups, Caution, 0.7, "Thunderbird offline IMAP copies"),
        "Messages stay on the server and are downloaded again on next sync.",
    ),
    // Catch-all
    dir("**/.cache/*", GeneralCache, Safe, 0.6, "Cache: {name}"),
    with_note(
        dir("/var/cache/*", GeneralCache, Critical, 0.6, "System cache: {name}"),
        "Managed by system services; prefer the owning tool's own clean command.",
    ),
    with_note(
        RuleSpec {
            target: RuleTarget::Any,
            ..dir("/tmp/*", GeneralCache, Caution, 0.45, "Temporary file: {name}")
        },
        "May belong to a running program; deleting it can interrupt that program.",
    ),
    with_note(
        RuleSpec {
            target: RuleTarget::Any,
            ..dir("/var/tmp/*", GeneralCache, Caution, 0.45, "Temporary file: {name}")
        },
        "May belong to a running program; deleting it can interrupt that program.",
    ),
];
