use super::GitCommand;
use anyhow::{Context, Result};

impl GitCommand {
    /// Force-delete a local branch. Always `-D`: git does not consider
    /// squash-merged or stale branches merged.
    pub fn branch_delete(&self, branch: &str) -> Result<()> {
        let output = self
            .git()
            .args(["branch", "-D", "--", branch])
            .output()
            .context("Failed to execute git branch command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git branch delete failed: {}", stderr);
        }

        Ok(())
    }
}
