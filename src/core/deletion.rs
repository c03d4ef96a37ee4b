//! Safety-checked branch deletion.
//!
//! Every request walks the same stages:
//!
//! ```text
//! ProtectionCheck → PrCheck → Eligibility → WorktreeCheck → UncommittedCheck
//!     → RemoteDelete → LocalDelete → Deleted
//! ```
//!
//! Only the configured remote is ever touched; copies of the branch on other
//! remotes are reported in the outcome and left alone. The remote ref is
//! removed only when its tip is contained in the local branch or the
//! mainline, and always before the local one. If the remote refuses, the
//! local branch is kept and the outcome is `Failed`. Force only
//! widens eligibility; it never skips the worktree check or the ordering.
//! Uncommitted work is only ignored with the separate `allow_uncommitted`
//! option.

use super::adapter::{local_ref, remote_ref, RemoteDeletion, RepositoryAdapter};
use super::analysis::mainline_tip;
use super::cache::BranchCache;
use super::error::{KeeperError, Result};
use super::model::{BranchResult, BranchStatus, DeletionReason, DeletionRequest};
use super::pool::{run_bounded, CancelToken};
use super::worktree_guard::WorktreeGuard;
use super::ProgressSink;
use crate::settings::KeeperSettings;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionStage {
    ProtectionCheck,
    PrCheck,
    Eligibility,
    WorktreeCheck,
    UncommittedCheck,
    RemoteDelete,
    LocalDelete,
}

impl fmt::Display for DeletionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ProtectionCheck => "protection check",
            Self::PrCheck => "pull request check",
            Self::Eligibility => "eligibility check",
            Self::WorktreeCheck => "worktree check",
            Self::UncommittedCheck => "uncommitted changes check",
            Self::RemoteDelete => "remote delete",
            Self::LocalDelete => "local delete",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Protected,
    Ignored,
    OpenPullRequest(u32),
    WorktreeConflict(PathBuf),
    /// Analysis status does not support the requested reason.
    NotEligible(BranchStatus),
    /// No analysis result for the branch and the request was not forced.
    NotAnalyzed,
    /// The branch tip moved after it was analysed.
    ChangedSinceAnalysis,
    /// The remote copy has commits found in neither the local branch nor the
    /// mainline.
    RemoteHasUnmergedCommits(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protected => f.write_str("protected"),
            Self::Ignored => f.write_str("matches an ignore pattern"),
            Self::OpenPullRequest(n) => write!(f, "{n} open pull request(s)"),
            Self::WorktreeConflict(path) => write!(f, "checked out in {}", path.display()),
            Self::NotEligible(status) => write!(f, "branch is {status}"),
            Self::NotAnalyzed => f.write_str("not analysed"),
            Self::ChangedSinceAnalysis => f.write_str("branch changed since analysis"),
            Self::RemoteHasUnmergedCommits(remote) => {
                write!(f, "{remote} copy has commits not in the local branch or mainline")
            }
        }
    }
}

/// Terminal result for one request. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted {
        branch: String,
        remote_deleted: bool,
        /// Another remote that still holds a branch of the same name.
        kept_on: Option<String>,
    },
    /// Dry run: every check passed, nothing was changed.
    WouldDelete {
        branch: String,
        remote: Option<String>,
        kept_on: Option<String>,
    },
    Skipped {
        branch: String,
        reason: SkipReason,
    },
    Failed {
        branch: String,
        stage: DeletionStage,
        error: KeeperError,
    },
}

impl DeletionOutcome {
    pub fn branch(&self) -> &str {
        match self {
            Self::Deleted { branch, .. }
            | Self::WouldDelete { branch, .. }
            | Self::Skipped { branch, .. }
            | Self::Failed { branch, .. } => branch,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    fn skipped(branch: &str, reason: SkipReason) -> Self {
        Self::Skipped {
            branch: branch.to_string(),
            reason,
        }
    }

    fn failed(branch: &str, stage: DeletionStage, error: KeeperError) -> Self {
        Self::Failed {
            branch: branch.to_string(),
            stage,
            error,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeletionOptions {
    /// Run every check, change nothing.
    pub dry_run: bool,
    /// Delete even when a worktree holding the branch is dirty or stashes
    /// exist for it. Separate from `force` on purpose.
    pub allow_uncommitted: bool,
    pub cancel: CancelToken,
}

/// Build requests for every deletion candidate of an analysis run.
pub fn requests_for(results: &[BranchResult], include_stale: bool) -> Vec<DeletionRequest> {
    results
        .iter()
        .filter(|r| r.is_deletion_candidate())
        .filter(|r| include_stale || r.status == BranchStatus::Merged)
        .filter_map(|r| {
            DeletionReason::from_status(r.status).map(|reason| DeletionRequest::new(r.name(), reason))
        })
        .collect()
}

type SharedSink<'s> = Mutex<&'s mut (dyn ProgressSink + Send)>;

pub struct DeletionCoordinator<'a> {
    repo: &'a dyn RepositoryAdapter,
    settings: &'a KeeperSettings,
    cache: Option<&'a BranchCache>,
    remote_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    local_lock: Mutex<()>,
}

impl<'a> DeletionCoordinator<'a> {
    pub fn new(repo: &'a dyn RepositoryAdapter, settings: &'a KeeperSettings) -> Self {
        Self {
            repo,
            settings,
            cache: None,
            remote_locks: Mutex::new(HashMap::new()),
            local_lock: Mutex::new(()),
        }
    }

    /// Invalidate cache entries of deleted branches.
    pub fn with_cache(mut self, cache: &'a BranchCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Process every request, returning outcomes in request order.
    /// Requests not started before cancellation have no outcome.
    pub fn delete(
        &self,
        requests: &[DeletionRequest],
        analysis: &[BranchResult],
        options: &DeletionOptions,
        sink: &mut (dyn ProgressSink + Send),
    ) -> Vec<DeletionOutcome> {
        let by_name: HashMap<&str, &BranchResult> =
            analysis.iter().map(|r| (r.name(), r)).collect();
        let sink: SharedSink<'_> = Mutex::new(sink);

        let outcomes = run_bounded(requests, self.settings.workers, &options.cancel, |request| {
            let outcome = self.process(request, by_name.get(request.branch.as_str()).copied(), options, &sink);
            log_outcome(&outcome);
            outcome
        });

        outcomes.into_iter().flatten().collect()
    }

    fn process(
        &self,
        request: &DeletionRequest,
        analysis: Option<&BranchResult>,
        options: &DeletionOptions,
        sink: &SharedSink<'_>,
    ) -> DeletionOutcome {
        let name = request.branch.as_str();

        // ProtectionCheck
        if self.settings.is_protected(name) {
            return DeletionOutcome::skipped(name, SkipReason::Protected);
        }
        if self.settings.is_ignored(name) {
            return DeletionOutcome::skipped(name, SkipReason::Ignored);
        }

        // PrCheck
        if let Some(open) = analysis.and_then(|r| r.branch.open_prs).filter(|n| *n > 0) {
            return DeletionOutcome::skipped(name, SkipReason::OpenPullRequest(open));
        }

        // Eligibility
        if let Some(reason) = eligibility(request, analysis) {
            return DeletionOutcome::skipped(name, reason);
        }
        let current_sha = match self.repo.head_sha(&local_ref(name)) {
            Ok(Some(sha)) => sha,
            Ok(None) => {
                return DeletionOutcome::failed(
                    name,
                    DeletionStage::Eligibility,
                    KeeperError::BranchNotFound(name.to_string()),
                )
            }
            Err(e) => return DeletionOutcome::failed(name, DeletionStage::Eligibility, e),
        };
        if analysis.is_some_and(|r| r.branch.local_sha != current_sha) {
            return DeletionOutcome::skipped(name, SkipReason::ChangedSinceAnalysis);
        }

        // WorktreeCheck, against the live list
        let guard = WorktreeGuard::new(self.repo);
        match guard.ensure_detached(name) {
            Ok(()) => {}
            Err(KeeperError::WorktreeConflict { path, .. }) => {
                return DeletionOutcome::skipped(name, SkipReason::WorktreeConflict(path))
            }
            Err(e) => return DeletionOutcome::failed(name, DeletionStage::WorktreeCheck, e),
        }

        // UncommittedCheck
        match guard.uncommitted_work(name) {
            Ok(Some(details)) if !options.allow_uncommitted => {
                return DeletionOutcome::failed(
                    name,
                    DeletionStage::UncommittedCheck,
                    KeeperError::UncommittedChangesPresent {
                        branch: name.to_string(),
                        details,
                    },
                )
            }
            Ok(Some(details)) => {
                step(sink, &format!("Ignoring uncommitted work on {name}: {details}"));
            }
            Ok(None) => {}
            Err(e) => return DeletionOutcome::failed(name, DeletionStage::UncommittedCheck, e),
        }

        let remote_sha = match self.repo.head_sha(&remote_ref(&self.settings.remote, name)) {
            Ok(sha) => sha,
            Err(e) => return DeletionOutcome::failed(name, DeletionStage::RemoteDelete, e),
        };
        if let Some(remote_sha) = &remote_sha {
            match self.remote_work_is_kept(remote_sha, &current_sha) {
                Ok(true) => {}
                Ok(false) => {
                    return DeletionOutcome::skipped(
                        name,
                        SkipReason::RemoteHasUnmergedCommits(self.settings.remote.clone()),
                    )
                }
                Err(e) => return DeletionOutcome::failed(name, DeletionStage::RemoteDelete, e),
            }
        }
        let remote = remote_sha.map(|_| self.settings.remote.clone());

        let kept_on = match self.other_remote_holding(name) {
            Ok(kept_on) => kept_on,
            Err(e) => return DeletionOutcome::failed(name, DeletionStage::RemoteDelete, e),
        };
        if let Some(other) = &kept_on {
            step(
                sink,
                &format!("Leaving {other}/{name} alone; only {} is cleaned", self.settings.remote),
            );
        }

        if options.dry_run {
            return DeletionOutcome::WouldDelete {
                branch: name.to_string(),
                remote,
                kept_on,
            };
        }

        // RemoteDelete before LocalDelete, always.
        let mut remote_deleted = false;
        if let Some(remote) = remote {
            step(sink, &format!("Deleting remote branch {remote}/{name}..."));
            match self.delete_remote(&remote, name) {
                Ok(RemoteDeletion::Deleted) => {
                    remote_deleted = true;
                    step(sink, &format!("Remote branch {remote}/{name} deleted"));
                }
                Ok(RemoteDeletion::AlreadyAbsent) => {
                    step(sink, &format!("Remote branch {remote}/{name} was already gone"));
                }
                Err(e) => {
                    if matches!(e, KeeperError::RemoteRejected { .. }) {
                        warning(sink, &format!("{e}; keeping local branch {name}"));
                    }
                    return DeletionOutcome::failed(name, DeletionStage::RemoteDelete, e);
                }
            }
        }

        step(sink, &format!("Deleting local branch {name}..."));
        if let Err(e) = self.delete_local(name) {
            return DeletionOutcome::failed(name, DeletionStage::LocalDelete, e);
        }
        if let Some(cache) = self.cache {
            cache.invalidate(name);
        }
        step(sink, &format!("Branch {name} deleted"));

        DeletionOutcome::Deleted {
            branch: name.to_string(),
            remote_deleted,
            kept_on,
        }
    }

    /// Whether every commit on the remote copy survives in the local branch
    /// or the mainline.
    fn remote_work_is_kept(&self, remote_sha: &str, local_sha: &str) -> Result<bool> {
        if remote_sha == local_sha || self.repo.is_ancestor(remote_sha, local_sha)? {
            return Ok(true);
        }
        match mainline_tip(self.repo, self.settings)? {
            Some(mainline) => self.repo.is_ancestor(remote_sha, &mainline),
            None => Ok(false),
        }
    }

    /// First remote other than the configured one with a branch of this name.
    fn other_remote_holding(&self, name: &str) -> Result<Option<String>> {
        for remote in self.repo.remotes()? {
            if remote == self.settings.remote {
                continue;
            }
            if self.repo.head_sha(&remote_ref(&remote, name))?.is_some() {
                return Ok(Some(remote));
            }
        }
        Ok(None)
    }

    fn ensure_mutable(&self, name: &str) -> Result<()> {
        if self.settings.is_protected(name) || self.settings.is_ignored(name) {
            return Err(KeeperError::ProtectionViolation(name.to_string()));
        }
        Ok(())
    }

    fn delete_remote(&self, remote: &str, name: &str) -> Result<RemoteDeletion> {
        self.ensure_mutable(name)?;
        let lock = self.remote_lock(remote);
        let _held = lock.lock().unwrap_or_else(|e| e.into_inner());
        // The tracking ref may have vanished while waiting for the lock.
        if self.repo.head_sha(&remote_ref(remote, name))?.is_none() {
            return Ok(RemoteDeletion::AlreadyAbsent);
        }
        self.repo.delete_remote_ref(remote, name)
    }

    fn delete_local(&self, name: &str) -> Result<()> {
        self.ensure_mutable(name)?;
        let _held = self.local_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.repo.delete_local_ref(name)
    }

    /// Deletions against the same remote are serialized.
    fn remote_lock(&self, remote: &str) -> Arc<Mutex<()>> {
        let mut locks = self.remote_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(remote.to_string()).or_default())
    }
}

fn eligibility(request: &DeletionRequest, analysis: Option<&BranchResult>) -> Option<SkipReason> {
    let Some(result) = analysis else {
        return (!(request.reason == DeletionReason::Explicit && request.force))
            .then_some(SkipReason::NotAnalyzed);
    };
    let eligible = match request.reason {
        DeletionReason::Merged => result.status == BranchStatus::Merged,
        DeletionReason::Stale => result.status == BranchStatus::Stale,
        DeletionReason::Explicit => request.force || result.status.is_deletable(),
    };
    (!eligible).then_some(SkipReason::NotEligible(result.status))
}

fn lock_sink<'g, 's>(sink: &'g SharedSink<'s>) -> MutexGuard<'g, &'s mut (dyn ProgressSink + Send)> {
    sink.lock().unwrap_or_else(|e| e.into_inner())
}

fn step(sink: &SharedSink<'_>, msg: &str) {
    lock_sink(sink).on_step(msg);
}

fn warning(sink: &SharedSink<'_>, msg: &str) {
    lock_sink(sink).on_warning(msg);
}

fn log_outcome(outcome: &DeletionOutcome) {
    match outcome {
        DeletionOutcome::Skipped { branch, reason } => {
            crate::log_debug!("Skipped {branch}: {reason}");
        }
        DeletionOutcome::Failed {
            branch,
            stage,
            error,
        } => {
            crate::log_debug!("Failed {branch} at {stage}: {error}");
        }
        _ => {}
    }
}
