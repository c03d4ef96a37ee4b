use super::GitCommand;
use crate::core::model::ChangeSummary;
use anyhow::{Context, Result};
use std::path::Path;

impl GitCommand {
    /// Count modified, staged and untracked paths in a worktree.
    pub fn status_summary_in(&self, worktree_path: &Path) -> Result<ChangeSummary> {
        let output = std::process::Command::new("git")
            .args(["status", "--porcelain"])
            .current_dir(worktree_path)
            .output()
            .context("Failed to execute git status command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git status failed: {}", stderr);
        }

        let stdout =
            String::from_utf8(output.stdout).context("Failed to parse git status output")?;
        Ok(parse_status(&stdout))
    }

    /// Stash entries as `(stash@{n}, subject)`, newest first.
    pub fn stash_list(&self) -> Result<Vec<(String, String)>> {
        let output = self
            .git()
            .args(["stash", "list", "--format=%gd%x00%gs"])
            .output()
            .context("Failed to execute git stash list command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git stash list failed: {}", stderr);
        }

        let stdout =
            String::from_utf8(output.stdout).context("Failed to parse git stash list output")?;
        Ok(stdout
            .lines()
            .filter_map(|line| {
                let (selector, subject) = line.split_once('\0')?;
                Some((selector.to_string(), subject.to_string()))
            })
            .collect())
    }
}

fn parse_status(porcelain: &str) -> ChangeSummary {
    let mut summary = ChangeSummary::default();
    for line in porcelain.lines() {
        let mut chars = line.chars();
        let (Some(index), Some(worktree)) = (chars.next(), chars.next()) else {
            continue;
        };
        if index == '?' && worktree == '?' {
            summary.untracked += 1;
            continue;
        }
        if index != ' ' && index != '!' {
            summary.staged += 1;
        }
        if worktree != ' ' && worktree != '!' {
            summary.modified += 1;
        }
    }
    summary
}

/// Branch a stash was created on, from its subject: `WIP on <branch>: ...`
/// or `On <branch>: ...`.
pub(crate) fn stash_branch(subject: &str) -> Option<&str> {
    let rest = subject
        .strip_prefix("WIP on ")
        .or_else(|| subject.strip_prefix("On "))?;
    let (branch, _) = rest.split_once(": ")?;
    Some(branch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_counts() {
        let porcelain = " M src/lib.rs\nM  staged.rs\nMM both.rs\n?? new.txt\n?? other.txt\n";
        let summary = parse_status(porcelain);
        assert_eq!(summary.modified, 2);
        assert_eq!(summary.staged, 2);
        assert_eq!(summary.untracked, 2);
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_parse_status_clean() {
        assert!(parse_status("").is_clean());
    }

    #[test]
    fn test_stash_branch_from_subject() {
        assert_eq!(stash_branch("WIP on feature/x: abc123 msg"), Some("feature/x"));
        assert_eq!(stash_branch("On main: saved for later"), Some("main"));
        assert_eq!(stash_branch("autostash"), None);
    }
}
