//! Per-branch analysis cache keyed by (branch name, tip sha).
//!
//! Persisted as JSON under the git common dir. A missing, unreadable or
//! foreign-schema file is an empty cache, never an error for the caller.

use super::error::{KeeperError, Result};
use super::model::{BranchStatus, MergeVerdict, SyncStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Current cache schema version.
const CACHE_VERSION: u32 = 1;

pub const CACHE_DIR: &str = "branch-keeper";
pub const CACHE_FILE: &str = "cache.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub sha: String,
    /// Remote tip the entry was computed against.
    pub remote_sha: Option<String>,
    /// Mainline tip the entry was computed against.
    pub mainline_sha: Option<String>,
    pub status: BranchStatus,
    pub sync_status: SyncStatus,
    pub verdict: MergeVerdict,
    pub computed_at: DateTime<Utc>,
}

impl CacheEntry {
    fn matches(&self, key: &CacheKey<'_>) -> bool {
        self.sha == key.sha
            && self.remote_sha.as_deref() == key.remote_sha
            && self.mainline_sha.as_deref() == key.mainline_sha
    }
}

/// The tips an entry must have been computed against to be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheKey<'a> {
    pub sha: &'a str,
    pub remote_sha: Option<&'a str>,
    pub mainline_sha: Option<&'a str>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: BTreeMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

pub struct BranchCache {
    path: Option<PathBuf>,
    ttl: Duration,
    entries: Mutex<BTreeMap<String, CacheEntry>>,
    tips: Mutex<HashMap<String, String>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl BranchCache {
    /// A cache that is never written to disk.
    pub fn in_memory(ttl: Duration) -> Self {
        Self::with_entries(None, ttl, BTreeMap::new())
    }

    /// Open the cache stored at `path`, degrading to empty on any problem.
    pub fn open(path: PathBuf, ttl: Duration) -> Self {
        let entries = match load_entries(&path) {
            Ok(entries) => entries,
            Err(e) => {
                crate::log_warning!("{e}; starting with an empty cache");
                BTreeMap::new()
            }
        };
        Self::with_entries(Some(path), ttl, entries)
    }

    fn with_entries(path: Option<PathBuf>, ttl: Duration, entries: BTreeMap<String, CacheEntry>) -> Self {
        Self {
            path,
            ttl,
            entries: Mutex::new(entries),
            tips: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// `<git-common-dir>/branch-keeper/cache.json`
    pub fn default_path(git_common_dir: &Path) -> PathBuf {
        git_common_dir.join(CACHE_DIR).join(CACHE_FILE)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tips(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.tips.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serve the entry for `name` only while it was computed against `key`
    /// and the TTL has not elapsed. With `bypass` the lookup misses and the
    /// stored entry is left in place.
    pub fn get(&self, name: &str, key: &CacheKey<'_>, bypass: bool) -> Option<CacheEntry> {
        let found = if bypass {
            None
        } else {
            self.entries()
                .get(name)
                .filter(|e| e.matches(key) && self.is_fresh(e))
                .cloned()
        };

        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        let age = Utc::now() - entry.computed_at;
        // Future timestamps (clock skew) count as expired.
        age >= Duration::zero() && age < self.ttl
    }

    /// Record the tip a branch had when the current run listed it. Writes for
    /// any other sha are refused from then on.
    pub fn track_tip(&self, name: &str, sha: &str) {
        self.tips().insert(name.to_string(), sha.to_string());
    }

    /// Store an entry. Returns `false` when the write was refused because it
    /// is for a sha other than the tracked tip, or older than the stored one.
    pub fn put(&self, name: &str, entry: CacheEntry) -> bool {
        if let Some(tip) = self.tips().get(name) {
            if *tip != entry.sha {
                crate::log_debug!(
                    "Cache write for {name}@{} refused: branch is now at {tip}",
                    entry.sha
                );
                return false;
            }
        }

        let mut entries = self.entries();
        if let Some(existing) = entries.get(name) {
            if existing.computed_at > entry.computed_at {
                return false;
            }
        }
        entries.insert(name.to_string(), entry);
        true
    }

    pub fn invalidate(&self, name: &str) {
        self.entries().remove(name);
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn snapshot(&self) -> Vec<(String, CacheEntry)> {
        self.entries()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop entries of branches not in `live`.
    pub fn retain_branches(&self, live: &HashSet<String>) {
        self.entries().retain(|name, _| live.contains(name));
    }

    /// Atomically replace the file on disk. No-op for in-memory caches.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = CacheFile {
            version: CACHE_VERSION,
            entries: self.entries().clone(),
        };
        write_atomically(path, &file)
    }
}

fn load_entries(path: &Path) -> Result<BTreeMap<String, CacheEntry>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(KeeperError::CacheUnavailable(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        }
    };
    let file: CacheFile = serde_json::from_str(&contents).map_err(|e| {
        KeeperError::CacheUnavailable(format!("{} is corrupt: {e}", path.display()))
    })?;
    if file.version != CACHE_VERSION {
        return Err(KeeperError::CacheUnavailable(format!(
            "{} has schema version {}, expected {CACHE_VERSION}",
            path.display(),
            file.version
        )));
    }
    Ok(file.entries)
}

fn write_atomically(path: &Path, file: &CacheFile) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| unavailable("no parent directory for", path, "root path"))?;
    fs::create_dir_all(parent).map_err(|e| unavailable("cannot create directory for", path, e))?;

    let contents =
        serde_json::to_string_pretty(file).map_err(|e| unavailable("cannot serialize", path, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| unavailable("cannot create temp file for", path, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| unavailable("cannot write", path, e))?;
    tmp.persist(path)
        .map_err(|e| unavailable("cannot replace", path, e.error))?;
    Ok(())
}

fn unavailable(what: &str, path: &Path, err: impl std::fmt::Display) -> KeeperError {
    KeeperError::CacheUnavailable(format!("{what} {}: {err}", path.display()))
}
