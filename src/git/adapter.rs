//! [`RepositoryAdapter`] over the git CLI (and gitoxide where enabled).

use super::stash::stash_branch;
use super::GitCommand;
use crate::core::adapter::{RemoteDeletion, RepositoryAdapter};
use crate::core::error::{KeeperError, Result};
use crate::core::model::{BranchRef, ChangeSummary, CommitInfo, WorktreeInfo};
use std::collections::HashSet;
use std::path::Path;

/// Fragments git and common hosts print when a push is refused.
const REJECTION_MARKERS: &[&str] = &[
    "[remote rejected]",
    "[rejected]",
    "declined",
    "protected branch",
    "prohibited",
    "permission denied",
    "not allowed",
];

const ALREADY_ABSENT_MARKERS: &[&str] = &["remote ref does not exist", "unable to delete"];

impl GitCommand {
    /// Fail fast with [`KeeperError::RepositoryNotFound`] outside a repository.
    pub fn ensure_repository(&self) -> Result<()> {
        let inside = self
            .is_inside_git_repo()
            .map_err(|e| KeeperError::repo("rev-parse", e))?;
        if !inside {
            return Err(KeeperError::RepositoryNotFound(self.location()));
        }
        Ok(())
    }

    fn location(&self) -> String {
        match &self.repo_path {
            Some(path) => path.display().to_string(),
            None => std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| ".".to_string()),
        }
    }

    fn convert(&self, operation: &str, err: anyhow::Error) -> KeeperError {
        let message = format!("{err:#}");
        if message.to_lowercase().contains("not a git repository") {
            return KeeperError::RepositoryNotFound(self.location());
        }
        KeeperError::repo(operation, message)
    }
}

/// Decide what a failed `push --delete` means.
fn classify_push_failure(remote: &str, branch: &str, message: &str) -> Result<RemoteDeletion> {
    let lowered = message.to_lowercase();
    if ALREADY_ABSENT_MARKERS.iter().any(|m| lowered.contains(m))
        && !REJECTION_MARKERS[..2].iter().any(|m| lowered.contains(m))
    {
        return Ok(RemoteDeletion::AlreadyAbsent);
    }
    if REJECTION_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Err(KeeperError::RemoteRejected {
            remote: remote.to_string(),
            branch: branch.to_string(),
            reason: message.trim().to_string(),
        });
    }
    Err(KeeperError::repo_for("push --delete", branch, message))
}

impl RepositoryAdapter for GitCommand {
    fn list_branches(&self) -> Result<Vec<BranchRef>> {
        self.list_local_branches()
            .map_err(|e| self.convert("for-each-ref", e))
    }

    fn head_sha(&self, reference: &str) -> Result<Option<String>> {
        self.resolve_ref(reference)
            .map_err(|e| self.convert("rev-parse", e))
    }

    fn remotes(&self) -> Result<Vec<String>> {
        self.remote_list().map_err(|e| self.convert("remote", e))
    }

    fn current_branch(&self) -> Result<Option<String>> {
        self.symbolic_ref_short_head()
            .map_err(|e| self.convert("symbolic-ref", e))
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>> {
        GitCommand::merge_base(self, a, b).map_err(|e| self.convert("merge-base", e))
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        self.merge_base_is_ancestor(ancestor, descendant)
            .map_err(|e| self.convert("merge-base --is-ancestor", e))
    }

    fn count_unique(&self, include: &str, exclude: &str) -> Result<u32> {
        self.rev_list_count(&format!("{exclude}..{include}"))
            .map_err(|e| self.convert("rev-list --count", e))
    }

    fn diff(&self, a: &str, b: &str) -> Result<String> {
        self.diff_three_dot(a, b).map_err(|e| self.convert("diff", e))
    }

    fn commit_patch(&self, sha: &str) -> Result<String> {
        self.show_patch(sha).map_err(|e| self.convert("show", e))
    }

    fn commits_since(&self, reference: &str, limit: Option<usize>) -> Result<Vec<CommitInfo>> {
        self.log_commits(reference, limit)
            .map_err(|e| self.convert("log", e))
    }

    fn ancestry(&self, reference: &str) -> Result<HashSet<String>> {
        self.rev_list_all(reference)
            .map_err(|e| self.convert("rev-list", e))
    }

    fn list_worktrees(&self) -> Result<Vec<WorktreeInfo>> {
        self.worktree_list()
            .map_err(|e| self.convert("worktree list", e))
    }

    fn working_tree_changes(&self, path: &Path) -> Result<ChangeSummary> {
        self.status_summary_in(path)
            .map_err(|e| self.convert("status", e))
    }

    fn stashes_for_branch(&self, branch: &str) -> Result<Vec<String>> {
        let entries = self
            .stash_list()
            .map_err(|e| self.convert("stash list", e))?;
        Ok(entries
            .into_iter()
            .filter(|(_, subject)| stash_branch(subject) == Some(branch))
            .map(|(selector, subject)| format!("{selector}: {subject}"))
            .collect())
    }

    fn delete_local_ref(&self, branch: &str) -> Result<()> {
        if self
            .resolve_ref(&format!("refs/heads/{branch}"))
            .map_err(|e| self.convert("rev-parse", e))?
            .is_none()
        {
            return Err(KeeperError::BranchNotFound(branch.to_string()));
        }
        self.branch_delete(branch)
            .map_err(|e| KeeperError::repo_for("branch -D", branch, format!("{e:#}")))
    }

    fn delete_remote_ref(&self, remote: &str, branch: &str) -> Result<RemoteDeletion> {
        match self.push_delete(remote, branch) {
            Ok(()) => Ok(RemoteDeletion::Deleted),
            Err(e) => classify_push_failure(remote, branch, &format!("{e:#}")),
        }
    }
}
