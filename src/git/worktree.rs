use super::GitCommand;
use crate::core::model::WorktreeInfo;
use anyhow::{Context, Result};
use std::path::PathBuf;

impl GitCommand {
    pub fn worktree_list_porcelain(&self) -> Result<String> {
        let output = self
            .git()
            .args(["worktree", "list", "--porcelain"])
            .output()
            .context("Failed to execute git worktree list command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git worktree list failed: {}", stderr);
        }

        String::from_utf8(output.stdout).context("Failed to parse git worktree list output")
    }

    pub fn worktree_list(&self) -> Result<Vec<WorktreeInfo>> {
        let porcelain = self.worktree_list_porcelain()?;
        let mut worktrees = parse_worktree_list(&porcelain);
        for worktree in &mut worktrees {
            if !worktree.is_orphaned && !worktree.path.exists() {
                worktree.is_orphaned = true;
            }
        }
        Ok(worktrees)
    }
}

/// Parse `git worktree list --porcelain`.
///
/// Format, one block per worktree separated by a blank line:
/// ```text
/// worktree /path/to/worktree
/// HEAD <sha>
/// branch refs/heads/branch-name   (or `detached`, or `bare`)
/// prunable gitdir file points to non-existent location
/// ```
/// The first block is the main worktree. `prunable` marks it orphaned.
pub fn parse_worktree_list(porcelain: &str) -> Vec<WorktreeInfo> {
    let mut worktrees: Vec<WorktreeInfo> = Vec::new();
    let mut current: Option<WorktreeInfo> = None;

    for line in porcelain.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(done) = current.take() {
                worktrees.push(done);
            }
            current = Some(WorktreeInfo {
                path: PathBuf::from(path),
                branch: None,
                head: None,
                is_main: worktrees.is_empty(),
                is_orphaned: false,
            });
            continue;
        }
        let Some(worktree) = current.as_mut() else {
            continue;
        };
        if let Some(sha) = line.strip_prefix("HEAD ") {
            worktree.head = Some(sha.to_string());
        } else if let Some(branch_ref) = line.strip_prefix("branch ") {
            worktree.branch = branch_ref.strip_prefix("refs/heads/").map(String::from);
        } else if line == "prunable" || line.starts_with("prunable ") {
            worktree.is_orphaned = true;
        } else if line.is_empty() {
            if let Some(done) = current.take() {
                worktrees.push(done);
            }
        }
    }
    // Don't forget the last worktree
    if let Some(done) = current.take() {
        worktrees.push(done);
    }

    worktrees
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORCELAIN: &str = "\
worktree /work/repo
HEAD 1111111111111111111111111111111111111111
branch refs/heads/main

worktree /work/feature-x
HEAD 2222222222222222222222222222222222222222
branch refs/heads/feature/x

worktree /work/detached
HEAD 3333333333333333333333333333333333333333
detached

worktree /work/gone
HEAD 4444444444444444444444444444444444444444
branch refs/heads/old
prunable gitdir file points to non-existent location
";

    #[test]
    fn test_parse_worktree_list() {
        let worktrees = parse_worktree_list(PORCELAIN);
        assert_eq!(worktrees.len(), 4);

        assert!(worktrees[0].is_main);
        assert_eq!(worktrees[0].branch.as_deref(), Some("main"));

        assert!(!worktrees[1].is_main);
        assert_eq!(worktrees[1].path, PathBuf::from("/work/feature-x"));
        assert_eq!(worktrees[1].branch.as_deref(), Some("feature/x"));

        assert_eq!(worktrees[2].branch, None);
        assert_eq!(
            worktrees[2].head.as_deref(),
            Some("3333333333333333333333333333333333333333")
        );

        assert!(worktrees[3].is_orphaned);
        assert_eq!(worktrees[3].branch.as_deref(), Some("old"));
    }

    #[test]
    fn test_parse_bare_main_worktree() {
        let worktrees = parse_worktree_list("worktree /srv/repo.git\nbare\n");
        assert_eq!(worktrees.len(), 1);
        assert!(worktrees[0].is_main);
        assert_eq!(worktrees[0].branch, None);
    }
}
