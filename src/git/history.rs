use super::GitCommand;
use crate::core::model::CommitInfo;
use anyhow::{Context, Result};

/// Fields separated by US, records by RS so multi-line messages survive.
const LOG_FORMAT: &str = "--format=%H%x1f%P%x1f%ct%x1f%B%x1e";

/// Whitespace normalisation shared by branch and commit diffs so the two
/// can be compared textually.
const DIFF_FLAGS: [&str; 3] = ["--no-color", "--ignore-space-change", "--ignore-blank-lines"];

impl GitCommand {
    /// Commits reachable from `rev`, newest first.
    pub fn log_commits(&self, rev: &str, limit: Option<usize>) -> Result<Vec<CommitInfo>> {
        let mut cmd = self.git();
        cmd.args(["log", LOG_FORMAT]);
        if let Some(limit) = limit {
            cmd.arg(format!("--max-count={limit}"));
        }
        cmd.arg(rev).arg("--");

        let output = cmd.output().context("Failed to execute git log command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git log failed: {}", stderr);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_log(&stdout))
    }

    /// Diff between the merge base of `base` and `head`, and `head`.
    pub fn diff_three_dot(&self, base: &str, head: &str) -> Result<String> {
        let output = self
            .git()
            .arg("diff")
            .args(DIFF_FLAGS)
            .arg(format!("{base}...{head}"))
            .arg("--")
            .output()
            .context("Failed to execute git diff command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git diff failed: {}", stderr);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// The patch a single commit introduces, without its header.
    pub fn show_patch(&self, sha: &str) -> Result<String> {
        let output = self
            .git()
            .arg("show")
            .args(DIFF_FLAGS)
            .args(["--format=", sha])
            .output()
            .context("Failed to execute git show command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git show failed: {}", stderr);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn parse_log(output: &str) -> Vec<CommitInfo> {
    output
        .split('\x1e')
        .filter_map(|record| {
            let record = record.trim_start_matches('\n');
            if record.is_empty() {
                return None;
            }
            let mut fields = record.splitn(4, '\x1f');
            let sha = fields.next()?.trim().to_string();
            let parents = fields
                .next()?
                .split_whitespace()
                .map(String::from)
                .collect();
            let time = fields.next()?.trim().parse::<i64>().unwrap_or(0);
            let message = fields.next().unwrap_or("").trim_end().to_string();
            Some(CommitInfo {
                sha,
                parents,
                time,
                message,
            })
        })
        .collect()
}
