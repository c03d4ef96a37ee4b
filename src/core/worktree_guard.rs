//! Refuses deletion of branches attached to a working directory.

use super::adapter::RepositoryAdapter;
use super::error::{KeeperError, Result};
use super::model::{ChangeSummary, WorktreeInfo};

pub struct WorktreeGuard<'a> {
    repo: &'a dyn RepositoryAdapter,
}

impl<'a> WorktreeGuard<'a> {
    pub fn new(repo: &'a dyn RepositoryAdapter) -> Self {
        Self { repo }
    }

    /// Point-in-time list of worktrees, for the analysis pass.
    pub fn snapshot(&self) -> Result<Vec<WorktreeInfo>> {
        self.repo.list_worktrees()
    }

    /// Live check against the current worktree list. Call immediately before
    /// any mutation; a result from an earlier snapshot is not enough.
    pub fn worktree_for(&self, branch: &str) -> Result<Option<WorktreeInfo>> {
        let worktrees = self.repo.list_worktrees()?;
        Ok(attached_to(&worktrees, branch).cloned())
    }

    /// Fails with [`KeeperError::WorktreeConflict`] while `branch` is checked
    /// out anywhere, orphaned worktrees included.
    pub fn ensure_detached(&self, branch: &str) -> Result<()> {
        match self.worktree_for(branch)? {
            Some(worktree) => Err(KeeperError::WorktreeConflict {
                branch: branch.to_string(),
                path: worktree.path,
            }),
            None => Ok(()),
        }
    }

    /// Describe uncommitted work that would be lost with `branch`: dirty
    /// worktrees holding it and stash entries recorded on it. Read-only; never
    /// checks anything out.
    pub fn uncommitted_work(&self, branch: &str) -> Result<Option<String>> {
        let mut details = Vec::new();

        for worktree in self.repo.list_worktrees()? {
            if worktree.branch.as_deref() != Some(branch) || worktree.is_orphaned {
                continue;
            }
            let changes: ChangeSummary = self.repo.working_tree_changes(&worktree.path)?;
            if !changes.is_clean() {
                details.push(format!(
                    "{} in {}",
                    changes.indicators(),
                    worktree.path.display()
                ));
            }
        }

        let stashes = self.repo.stashes_for_branch(branch)?;
        if !stashes.is_empty() {
            details.push(format!("{} stash entr{}", stashes.len(), plural_y(stashes.len())));
        }

        Ok((!details.is_empty()).then(|| details.join(", ")))
    }
}

/// The worktree `branch` is checked out in, orphaned ones included.
pub fn attached_to<'w>(worktrees: &'w [WorktreeInfo], branch: &str) -> Option<&'w WorktreeInfo> {
    worktrees
        .iter()
        .find(|w| w.branch.as_deref() == Some(branch))
}

fn plural_y(n: usize) -> &'static str {
    if n == 1 {
        "y"
    } else {
        "ies"
    }
}
