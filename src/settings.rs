//! Git config-based settings for branch-keeper.
//!
//! Settings are loaded from git's layered config system (local → global)
//! with built-in defaults as fallback. The engine receives one immutable
//! [`KeeperSettings`] snapshot per run.
//!
//! # Config Keys
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `branchKeeper.mainBranch` | `main` | Mainline branch merges are detected against |
//! | `branchKeeper.remote` | `"origin"` | Remote used for sync status and deletion |
//! | `branchKeeper.protected` | `main`, `master` | Protected branch names (multi-valued) |
//! | `branchKeeper.ignore` | none | Glob patterns of branches to leave alone (multi-valued) |
//! | `branchKeeper.staleDays` | `30` | Days without commits before a branch is stale |
//! | `branchKeeper.precedence` | `merged-first` | `merged-first` or `stale-first` |
//! | `branchKeeper.workers` | cores + 4, max 32 | Analysis worker threads |
//! | `branchKeeper.cacheTtlHours` | `24` | Lifetime of cached analysis results |
//! | `branchKeeper.sortBy` | `age` | `name`, `age`, `date` or `status` |
//! | `branchKeeper.sortOrder` | `asc` | `asc` or `desc` |
//! | `branchKeeper.squashScanDepth` | `50` | Mainline commits searched for squash merges |
//! | `branchKeeper.experimental.gitoxide` | `false` | Use gitoxide for ref reads |
//!
//! # Example
//!
//! ```bash
//! # Treat release branches as protected in this repository
//! git config --add branchKeeper.protected release
//!
//! # Never touch personal scratch branches
//! git config --global --add branchKeeper.ignore 'wip/*'
//!
//! # Let staleness win over a merged verdict
//! git config branchKeeper.precedence stale-first
//! ```

use crate::core::pool;
use crate::git::GitCommand;
use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;

/// Which tier wins when a branch is both merged and stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    MergedFirst,
    StaleFirst,
}

impl Precedence {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "merged-first" => Some(Self::MergedFirst),
            "stale-first" => Some(Self::StaleFirst),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Age,
    Date,
    Status,
}

impl SortKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "name" => Some(Self::Name),
            "age" => Some(Self::Age),
            "date" => Some(Self::Date),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Default values for settings.
pub mod defaults {
    use super::{Precedence, SortKey, SortOrder};

    pub const MAIN_BRANCH: &str = "main";

    pub const REMOTE: &str = "origin";

    pub const PROTECTED: [&str; 2] = ["main", "master"];

    pub const STALE_DAYS: u32 = 30;

    pub const PRECEDENCE: Precedence = Precedence::MergedFirst;

    pub const CACHE_TTL_HOURS: u32 = 24;

    pub const SORT_BY: SortKey = SortKey::Age;

    pub const SORT_ORDER: SortOrder = SortOrder::Asc;

    pub const SQUASH_SCAN_DEPTH: usize = 50;

    pub const GITOXIDE: bool = false;
}

/// Git config keys for branch-keeper settings.
pub mod keys {
    pub const MAIN_BRANCH: &str = "branchKeeper.mainBranch";

    pub const REMOTE: &str = "branchKeeper.remote";

    /// Multi-valued.
    pub const PROTECTED: &str = "branchKeeper.protected";

    /// Multi-valued.
    pub const IGNORE: &str = "branchKeeper.ignore";

    pub const STALE_DAYS: &str = "branchKeeper.staleDays";

    pub const PRECEDENCE: &str = "branchKeeper.precedence";

    pub const WORKERS: &str = "branchKeeper.workers";

    pub const CACHE_TTL_HOURS: &str = "branchKeeper.cacheTtlHours";

    pub const SORT_BY: &str = "branchKeeper.sortBy";

    pub const SORT_ORDER: &str = "branchKeeper.sortOrder";

    pub const SQUASH_SCAN_DEPTH: &str = "branchKeeper.squashScanDepth";

    pub const GITOXIDE: &str = "branchKeeper.experimental.gitoxide";
}

/// Compiled ignore globs.
#[derive(Debug, Clone)]
pub struct IgnorePatterns {
    patterns: Vec<String>,
    set: GlobSet,
}

impl IgnorePatterns {
    pub fn new(patterns: Vec<String>) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            builder.add(
                Glob::new(pattern).with_context(|| format!("Invalid ignore pattern '{pattern}'"))?,
            );
        }
        let set = builder.build().context("Failed to compile ignore patterns")?;
        Ok(Self { patterns, set })
    }

    pub fn is_match(&self, branch: &str) -> bool {
        self.set.is_match(branch)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for IgnorePatterns {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }
}

/// Configuration snapshot consumed by the analysis pipeline and the
/// deletion coordinator.
///
/// Settings are loaded from git config with the following priority:
/// 1. Repository-local config (`git config branchKeeper.x`)
/// 2. Global config (`git config --global branchKeeper.x`)
/// 3. Built-in defaults
#[derive(Debug, Clone)]
pub struct KeeperSettings {
    pub main_branch: String,
    pub remote: String,
    /// Never deleted. Always contains `main_branch`.
    pub protected: BTreeSet<String>,
    pub ignore: IgnorePatterns,
    pub stale_days: u32,
    pub precedence: Precedence,
    pub workers: usize,
    pub cache_ttl_hours: u32,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub squash_scan_depth: usize,
    pub use_gitoxide: bool,
}

impl Default for KeeperSettings {
    fn default() -> Self {
        let mut protected: BTreeSet<String> =
            defaults::PROTECTED.iter().map(|s| s.to_string()).collect();
        protected.insert(defaults::MAIN_BRANCH.to_string());
        Self {
            main_branch: defaults::MAIN_BRANCH.to_string(),
            remote: defaults::REMOTE.to_string(),
            protected,
            ignore: IgnorePatterns::default(),
            stale_days: defaults::STALE_DAYS,
            precedence: defaults::PRECEDENCE,
            workers: pool::default_workers(),
            cache_ttl_hours: defaults::CACHE_TTL_HOURS,
            sort_by: defaults::SORT_BY,
            sort_order: defaults::SORT_ORDER,
            squash_scan_depth: defaults::SQUASH_SCAN_DEPTH,
            use_gitoxide: defaults::GITOXIDE,
        }
    }
}

impl KeeperSettings {
    /// Load settings from git config (local + global) of the repository
    /// `git` operates on.
    pub fn load(git: &GitCommand) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(value) = git.config_get(keys::MAIN_BRANCH)? {
            if !value.is_empty() {
                settings.main_branch = value;
            }
        }

        if let Some(value) = git.config_get(keys::REMOTE)? {
            if !value.is_empty() {
                settings.remote = value;
            }
        }

        let protected = git.config_get_all(keys::PROTECTED)?;
        if !protected.is_empty() {
            settings.protected = protected.into_iter().filter(|s| !s.is_empty()).collect();
        }
        settings.protected.insert(settings.main_branch.clone());

        let ignore = git.config_get_all(keys::IGNORE)?;
        if !ignore.is_empty() {
            settings.ignore = IgnorePatterns::new(ignore)?;
        }

        if let Some(value) = git.config_get(keys::STALE_DAYS)? {
            settings.stale_days =
                parse_or_default(keys::STALE_DAYS, &value, defaults::STALE_DAYS, |v| {
                    v.parse::<u32>().ok().filter(|d| *d > 0)
                });
        }

        if let Some(value) = git.config_get(keys::PRECEDENCE)? {
            settings.precedence =
                parse_or_default(keys::PRECEDENCE, &value, defaults::PRECEDENCE, Precedence::parse);
        }

        if let Some(value) = git.config_get(keys::WORKERS)? {
            settings.workers = parse_or_default(keys::WORKERS, &value, settings.workers, |v| {
                v.parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .map(|n| n.min(pool::MAX_WORKERS))
            });
        }

        if let Some(value) = git.config_get(keys::CACHE_TTL_HOURS)? {
            settings.cache_ttl_hours = parse_or_default(
                keys::CACHE_TTL_HOURS,
                &value,
                defaults::CACHE_TTL_HOURS,
                |v| v.parse::<u32>().ok(),
            );
        }

        if let Some(value) = git.config_get(keys::SORT_BY)? {
            settings.sort_by =
                parse_or_default(keys::SORT_BY, &value, defaults::SORT_BY, SortKey::parse);
        }

        if let Some(value) = git.config_get(keys::SORT_ORDER)? {
            settings.sort_order =
                parse_or_default(keys::SORT_ORDER, &value, defaults::SORT_ORDER, SortOrder::parse);
        }

        if let Some(value) = git.config_get(keys::SQUASH_SCAN_DEPTH)? {
            settings.squash_scan_depth = parse_or_default(
                keys::SQUASH_SCAN_DEPTH,
                &value,
                defaults::SQUASH_SCAN_DEPTH,
                |v| v.parse::<usize>().ok(),
            );
        }

        if let Some(value) = git.config_get(keys::GITOXIDE)? {
            settings.use_gitoxide = parse_bool(&value, defaults::GITOXIDE);
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.main_branch.trim().is_empty() {
            bail!("Main branch name must not be empty");
        }
        if self.stale_days == 0 {
            bail!("Stale threshold must be at least one day");
        }
        if self.remote.trim().is_empty() {
            bail!("Remote name must not be empty");
        }
        Ok(())
    }

    /// Point the mainline at another branch, keeping it protected.
    pub fn with_main_branch(mut self, name: &str) -> Self {
        self.main_branch = name.to_string();
        self.protected.insert(name.to_string());
        self
    }

    pub fn is_protected(&self, branch: &str) -> bool {
        branch == self.main_branch || self.protected.contains(branch)
    }

    pub fn is_ignored(&self, branch: &str) -> bool {
        self.ignore.is_match(branch)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.cache_ttl_hours))
    }
}

fn parse_or_default<T: Copy>(key: &str, value: &str, default: T, parse: impl Fn(&str) -> Option<T>) -> T {
    match parse(value.trim()) {
        Some(parsed) => parsed,
        None => {
            crate::log_warning!("Ignoring invalid value '{value}' for {key}; using the default");
            default
        }
    }
}

/// Parse a git config boolean value.
///
/// Git accepts various boolean representations:
/// - true: `true`, `yes`, `on`, `1`
/// - false: `false`, `no`, `off`, `0`
///
/// Returns the default value if parsing fails.
fn parse_bool(value: &str, default: bool) -> bool {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => true,
        "false" | "no" | "off" | "0" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = KeeperSettings::default();
        assert_eq!(settings.main_branch, "main");
        assert_eq!(settings.remote, "origin");
        assert!(settings.is_protected("main"));
        assert!(settings.is_protected("master"));
        assert!(!settings.is_protected("develop"));
        assert_eq!(settings.stale_days, 30);
        assert_eq!(settings.precedence, Precedence::MergedFirst);
        assert_eq!(settings.sort_by, SortKey::Age);
        assert_eq!(settings.sort_order, SortOrder::Asc);
        assert_eq!(settings.squash_scan_depth, 50);
        assert!(settings.workers >= 1 && settings.workers <= pool::MAX_WORKERS);
        assert!(!settings.use_gitoxide);
        settings.validate().unwrap();
    }

    #[test]
    fn test_with_main_branch_is_protected() {
        let settings = KeeperSettings::default().with_main_branch("trunk");
        assert!(settings.is_protected("trunk"));
        assert!(settings.is_protected("main"));
    }

    #[test]
    fn test_ignore_patterns() {
        let patterns =
            IgnorePatterns::new(vec!["wip/*".to_string(), "experiment-*".to_string()]).unwrap();
        assert!(patterns.is_match("wip/refactor"));
        assert!(patterns.is_match("experiment-42"));
        assert!(!patterns.is_match("feature/wip"));
        assert!(IgnorePatterns::new(vec!["[".to_string()]).is_err());
        assert!(!IgnorePatterns::default().is_match("anything"));
    }

    #[test]
    fn test_validate_rejects_zero_threshold_and_empty_main() {
        let mut settings = KeeperSettings {
            stale_days: 0,
            ..KeeperSettings::default()
        };
        assert!(settings.validate().is_err());
        settings.stale_days = 10;
        settings.main_branch = " ".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(Precedence::parse("Stale-First"), Some(Precedence::StaleFirst));
        assert_eq!(Precedence::parse("newest"), None);
        assert_eq!(SortKey::parse("STATUS"), Some(SortKey::Status));
        assert_eq!(SortKey::parse("size"), None);
        assert_eq!(SortOrder::parse("desc"), Some(SortOrder::Desc));
        assert_eq!(SortOrder::parse(""), None);
    }

    #[test]
    fn test_parse_or_default_falls_back() {
        assert_eq!(parse_or_default("k", "12", 30u32, |v| v.parse().ok()), 12);
        assert_eq!(parse_or_default("k", "soon", 30u32, |v| v.parse().ok()), 30);
    }

    #[test]
    fn test_parse_bool_variants() {
        assert!(parse_bool("Yes", false));
        assert!(parse_bool("1", false));
        assert!(!parse_bool("OFF", true));
        assert!(parse_bool("maybe", true));
        assert!(!parse_bool("maybe", false));
    }
}
