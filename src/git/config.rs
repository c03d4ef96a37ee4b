use super::oxide;
use super::GitCommand;
use anyhow::{Context, Result};

impl GitCommand {
    /// Get a git config value from the current repository (respects local + global config)
    pub fn config_get(&self, key: &str) -> Result<Option<String>> {
        if self.use_gitoxide {
            return oxide::config_get(&self.gix_repo()?, key);
        }
        let output = self
            .git()
            .args(["config", "--get", key])
            .output()
            .context("Failed to execute git config command")?;

        if output.status.success() {
            let value = String::from_utf8(output.stdout)
                .context("Failed to parse git config output")?
                .trim()
                .to_string();
            Ok(Some(value))
        } else {
            // Exit code 1 means the key was not found, which is not an error
            Ok(None)
        }
    }

    /// Every value of a multi-valued key, in config file order.
    pub fn config_get_all(&self, key: &str) -> Result<Vec<String>> {
        if self.use_gitoxide {
            return oxide::config_get_all(&self.gix_repo()?, key);
        }
        let output = self
            .git()
            .args(["config", "--get-all", key])
            .output()
            .context("Failed to execute git config command")?;

        match output.status.code() {
            Some(0) => {
                let stdout = String::from_utf8(output.stdout)
                    .context("Failed to parse git config output")?;
                Ok(stdout
                    .lines()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect())
            }
            // Exit code 1 means the key was not found, which is not an error
            Some(1) => Ok(Vec::new()),
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                anyhow::bail!("Git config --get-all failed: {}", stderr);
            }
        }
    }
}
