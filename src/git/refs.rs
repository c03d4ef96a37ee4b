use super::oxide;
use super::GitCommand;
use crate::core::model::BranchRef;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;

/// `for-each-ref` fields, NUL separated. `lstrip=2` keeps the plain branch
/// name even when a tag of the same name exists.
const BRANCH_FORMAT: &str = "%(refname:lstrip=2)%00%(objectname)%00%(committerdate:unix)";

impl GitCommand {
    /// Resolve a fully qualified ref to the commit it points at.
    /// Returns `None` if the ref does not exist.
    pub fn resolve_ref(&self, ref_name: &str) -> Result<Option<String>> {
        if self.use_gitoxide {
            return oxide::resolve_ref(&self.gix_repo()?, ref_name);
        }
        let output = self
            .git()
            .args(["rev-parse", "--verify", "--quiet"])
            .arg(format!("{ref_name}^{{commit}}"))
            .output()
            .context("Failed to execute git rev-parse command")?;

        if !output.status.success() {
            return Ok(None);
        }

        let stdout =
            String::from_utf8(output.stdout).context("Failed to parse git rev-parse output")?;
        let sha = stdout.trim();
        Ok((!sha.is_empty()).then(|| sha.to_string()))
    }

    /// All local branches with their tip and committer time.
    pub fn list_local_branches(&self) -> Result<Vec<BranchRef>> {
        let output = self
            .git()
            .args([
                "for-each-ref",
                &format!("--format={BRANCH_FORMAT}"),
                "refs/heads/",
            ])
            .output()
            .context("Failed to execute git for-each-ref command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git for-each-ref failed: {}", stderr);
        }

        let stdout =
            String::from_utf8(output.stdout).context("Failed to parse git for-each-ref output")?;
        Ok(parse_branch_list(&stdout))
    }

    /// Short name of the checked out branch, `None` when HEAD is detached.
    pub fn symbolic_ref_short_head(&self) -> Result<Option<String>> {
        if self.use_gitoxide {
            return oxide::symbolic_ref_short_head(&self.gix_repo()?);
        }
        let output = self
            .git()
            .args(["symbolic-ref", "--quiet", "--short", "HEAD"])
            .output()
            .context("Failed to execute git symbolic-ref command")?;

        // Exit code 1 with --quiet means HEAD is detached
        if !output.status.success() {
            return Ok(None);
        }

        let stdout =
            String::from_utf8(output.stdout).context("Failed to parse git symbolic-ref output")?;
        let branch = stdout.trim();
        Ok((!branch.is_empty()).then(|| branch.to_string()))
    }

    /// Check if the repository path is inside any Git repository (work tree or bare)
    pub fn is_inside_git_repo(&self) -> Result<bool> {
        let output = self
            .git()
            .args(["rev-parse", "--git-dir"])
            .stderr(std::process::Stdio::null())
            .output()
            .context("Failed to execute git rev-parse command")?;

        Ok(output.status.success())
    }

    /// The Git common directory, absolute.
    pub fn rev_parse_git_common_dir(&self) -> Result<PathBuf> {
        if self.use_gitoxide {
            return oxide::rev_parse_git_common_dir(&self.gix_repo()?);
        }
        let output = self
            .git()
            .args(["rev-parse", "--path-format=absolute", "--git-common-dir"])
            .output()
            .context("Failed to execute git rev-parse command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git rev-parse failed: {}", stderr);
        }

        let stdout =
            String::from_utf8(output.stdout).context("Failed to parse git rev-parse output")?;
        Ok(PathBuf::from(stdout.trim()))
    }

    pub fn rev_list_count(&self, range: &str) -> Result<u32> {
        if self.use_gitoxide {
            return oxide::rev_list_count(&self.gix_repo()?, range);
        }
        let output = self
            .git()
            .args(["rev-list", "--count", range])
            .output()
            .context("Failed to execute git rev-list command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git rev-list failed: {}", stderr);
        }

        let stdout =
            String::from_utf8(output.stdout).context("Failed to parse git rev-list output")?;

        stdout
            .trim()
            .parse::<u32>()
            .context("Failed to parse commit count as number")
    }

    /// Every commit reachable from `rev`.
    pub fn rev_list_all(&self, rev: &str) -> Result<HashSet<String>> {
        let output = self
            .git()
            .args(["rev-list", rev])
            .output()
            .context("Failed to execute git rev-list command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git rev-list failed: {}", stderr);
        }

        let stdout =
            String::from_utf8(output.stdout).context("Failed to parse git rev-list output")?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Best common ancestor of two commits, `None` for unrelated histories.
    pub fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>> {
        if self.use_gitoxide {
            return oxide::merge_base(&self.gix_repo()?, a, b);
        }
        let output = self
            .git()
            .args(["merge-base", a, b])
            .output()
            .context("Failed to execute git merge-base command")?;

        // Exit code 1 with empty stderr: no common ancestor
        if !output.status.success() {
            if output.stderr.is_empty() {
                return Ok(None);
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git merge-base failed: {}", stderr);
        }

        let stdout =
            String::from_utf8(output.stdout).context("Failed to parse git merge-base output")?;
        let sha = stdout.trim();
        Ok((!sha.is_empty()).then(|| sha.to_string()))
    }

    /// Check if `commit` is an ancestor of `target` using merge-base.
    pub fn merge_base_is_ancestor(&self, commit: &str, target: &str) -> Result<bool> {
        let output = self
            .git()
            .args(["merge-base", "--is-ancestor", commit, target])
            .output()
            .context("Failed to execute git merge-base command")?;

        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                anyhow::bail!("Git merge-base --is-ancestor failed: {}", stderr);
            }
        }
    }
}

fn parse_branch_list(output: &str) -> Vec<BranchRef> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\0');
            let name = fields.next()?.trim();
            let sha = fields.next()?.trim();
            if name.is_empty() || sha.is_empty() {
                return None;
            }
            let commit_time = fields
                .next()
                .and_then(|t| t.trim().parse::<i64>().ok())
                .unwrap_or(0);
            Some(BranchRef {
                name: name.to_string(),
                sha: sha.to_string(),
                commit_time,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_branch_list() {
        let output = "main\0aaa111\01700000000\nfeature/x\0bbb222\01690000000\n";
        let branches = parse_branch_list(output);
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[1].name, "feature/x");
        assert_eq!(branches[1].sha, "bbb222");
        assert_eq!(branches[1].commit_time, 1_690_000_000);
    }

    #[test]
    fn test_parse_branch_list_tolerates_missing_time() {
        let branches = parse_branch_list("topic\0ccc333\0\n\n");
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].commit_time, 0);
    }
}
