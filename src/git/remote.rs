use super::oxide;
use super::GitCommand;
use anyhow::{Context, Result};

impl GitCommand {
    /// Delete a remote branch via `git push <remote> --delete <branch>`.
    ///
    /// The remote's stderr is kept verbatim in the error so callers can tell
    /// a rejection from a missing ref.
    pub fn push_delete(&self, remote: &str, branch: &str) -> Result<()> {
        let mut cmd = self.git();
        cmd.args(["push", "--no-verify", "--porcelain", remote, "--delete", branch]);

        if self.quiet {
            cmd.arg("--quiet");
        }

        let output = cmd
            .output()
            .context("Failed to execute git push --delete command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            anyhow::bail!(
                "Git push --delete failed: {}{}",
                stderr.trim(),
                rejection_lines(&stdout)
            );
        }

        Ok(())
    }

    /// List all configured remotes.
    pub fn remote_list(&self) -> Result<Vec<String>> {
        if self.use_gitoxide {
            return oxide::remote_list(&self.gix_repo()?);
        }
        let output = self
            .git()
            .args(["remote"])
            .output()
            .context("Failed to execute git remote command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git remote failed: {}", stderr);
        }

        let stdout =
            String::from_utf8(output.stdout).context("Failed to parse git remote output")?;

        Ok(stdout
            .lines()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }
}

/// Porcelain push reports rejected refs on stdout as `!\t<ref>\t[reason]`.
fn rejection_lines(stdout: &str) -> String {
    stdout
        .lines()
        .filter(|l| l.starts_with('!'))
        .map(|l| format!("\n{}", l.trim()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_lines_only_keeps_rejected_refs() {
        let stdout = "To ../remote.git\n!\t:refs/heads/feature/x\t[remote rejected] (pre-receive hook declined)\nDone\n";
        assert_eq!(
            rejection_lines(stdout),
            "\n!\t:refs/heads/feature/x\t[remote rejected] (pre-receive hook declined)"
        );
        assert_eq!(rejection_lines("To ../remote.git\nDone\n"), "");
    }
}
