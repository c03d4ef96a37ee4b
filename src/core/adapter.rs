//! Capability surface the engine needs from the version-control backend.
//!
//! All methods are read-only except [`RepositoryAdapter::delete_local_ref`]
//! and [`RepositoryAdapter::delete_remote_ref`]. No method may change which
//! branch is checked out in any working directory.

use super::error::Result;
use super::model::{BranchRef, ChangeSummary, CommitInfo, WorktreeInfo};
use std::collections::HashSet;
use std::path::Path;

/// Result of asking a remote to drop a branch ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDeletion {
    Deleted,
    /// The remote no longer had the ref; nothing to delete.
    AlreadyAbsent,
}

pub trait RepositoryAdapter: Send + Sync {
    /// All local branches (`refs/heads/*`) with their tip and commit time.
    fn list_branches(&self) -> Result<Vec<BranchRef>>;

    /// Resolve a fully-qualified ref (`refs/heads/x`, `refs/remotes/o/x`).
    /// `Ok(None)` when the ref does not exist.
    fn head_sha(&self, reference: &str) -> Result<Option<String>>;

    /// Names of the configured remotes.
    fn remotes(&self) -> Result<Vec<String>>;

    /// Short name of the branch checked out in the invoking worktree, if any.
    fn current_branch(&self) -> Result<Option<String>>;

    fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>>;

    /// Whether `ancestor` is reachable from `descendant`.
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool>;

    /// Number of commits reachable from `include` but not from `exclude`.
    fn count_unique(&self, include: &str, exclude: &str) -> Result<u32>;

    /// Textual patch from `a` to `b`, ignoring whitespace-only changes.
    fn diff(&self, a: &str, b: &str) -> Result<String>;

    /// Patch introduced by a single commit, with the same diff options as
    /// [`RepositoryAdapter::diff`].
    fn commit_patch(&self, sha: &str) -> Result<String>;

    /// First-parent-agnostic history of `reference`, newest first.
    fn commits_since(&self, reference: &str, limit: Option<usize>) -> Result<Vec<CommitInfo>>;

    /// Every commit id reachable from `reference`.
    fn ancestry(&self, reference: &str) -> Result<HashSet<String>>;

    fn list_worktrees(&self) -> Result<Vec<WorktreeInfo>>;

    /// Uncommitted state of an existing working directory.
    fn working_tree_changes(&self, path: &Path) -> Result<ChangeSummary>;

    /// Stash entries that were recorded while `branch` was checked out.
    fn stashes_for_branch(&self, branch: &str) -> Result<Vec<String>>;

    fn delete_local_ref(&self, branch: &str) -> Result<()>;

    /// Errors with [`KeeperError::RemoteRejected`](super::KeeperError::RemoteRejected)
    /// when the remote refuses the update.
    fn delete_remote_ref(&self, remote: &str, branch: &str) -> Result<RemoteDeletion>;
}

pub fn local_ref(branch: &str) -> String {
    format!("refs/heads/{branch}")
}

pub fn remote_ref(remote: &str, branch: &str) -> String {
    format!("refs/remotes/{remote}/{branch}")
}
