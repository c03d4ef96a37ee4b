//! Throwaway repositories for integration tests.
//!
//! Every repository is a working clone (`work/`) of a bare remote
//! (`origin.git/`) inside one temp directory. All git commands run with
//! hook-inherited environment variables stripped and an explicit cwd so they
//! never touch the host repository.

#![allow(dead_code)]

use branch_keeper::{git::GitCommand, settings::KeeperSettings};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const GIT_ENV_VARS: &[&str] = &[
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_OBJECT_DIRECTORY",
    "GIT_ALTERNATE_OBJECT_DIRECTORIES",
    "GIT_COMMON_DIR",
    "GIT_CEILING_DIRECTORIES",
];

const DAY: i64 = 86_400;

pub fn git_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new("git");
    for var in GIT_ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("GIT_CONFIG_NOSYSTEM", "1");
    cmd.current_dir(dir);
    cmd
}

/// Run git in `dir`, panicking with stderr on failure.
pub fn git_in(dir: &Path, args: &[&str]) -> String {
    let output = git_cmd(dir).args(args).output().unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub struct TestRepo {
    dir: TempDir,
    pub work: PathBuf,
    pub origin: PathBuf,
}

impl TestRepo {
    /// `main` with one commit, pushed to `origin`.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let base = dir.path().canonicalize().unwrap();
        let work = base.join("work");
        let origin = base.join("origin.git");

        git_in(&base, &["init", "--bare", "-b", "main", "origin.git"]);
        git_in(&base, &["init", "-b", "main", "work"]);
        git_in(&work, &["config", "user.email", "test@test.com"]);
        git_in(&work, &["config", "user.name", "Test"]);
        git_in(&work, &["config", "commit.gpgsign", "false"]);
        git_in(&work, &["remote", "add", "origin", "../origin.git"]);

        let repo = Self { dir, work, origin };
        repo.commit("README.md", "# project\n", "Initial commit");
        repo.git(&["push", "--quiet", "-u", "origin", "main"]);
        repo
    }

    pub fn base(&self) -> &Path {
        self.dir.path()
    }

    pub fn git(&self, args: &[&str]) -> String {
        git_in(&self.work, args)
    }

    /// Write `file` and commit it on the current branch.
    pub fn commit(&self, file: &str, contents: &str, message: &str) -> String {
        std::fs::write(self.work.join(file), contents).unwrap();
        self.git(&["add", file]);
        self.git(&["commit", "--quiet", "-m", message]);
        self.git(&["rev-parse", "HEAD"])
    }

    /// Like [`commit`](Self::commit), with author and committer dates set
    /// `days_ago` days in the past.
    pub fn commit_aged(&self, file: &str, contents: &str, message: &str, days_ago: i64) -> String {
        let when = format!("{} +0000", chrono::Utc::now().timestamp() - days_ago * DAY);
        std::fs::write(self.work.join(file), contents).unwrap();
        self.git(&["add", file]);
        let output = git_cmd(&self.work)
            .args(["commit", "--quiet", "-m", message])
            .env("GIT_AUTHOR_DATE", &when)
            .env("GIT_COMMITTER_DATE", &when)
            .output()
            .unwrap();
        assert!(output.status.success(), "aged commit failed");
        self.git(&["rev-parse", "HEAD"])
    }

    /// Create `name` from `main` with one commit, then return to `main`.
    pub fn feature(&self, name: &str, file: &str) -> String {
        self.git(&["checkout", "--quiet", "-b", name, "main"]);
        let sha = self.commit(file, &format!("work on {name}\n"), &format!("Work on {name}"));
        self.git(&["checkout", "--quiet", "main"]);
        sha
    }

    pub fn push(&self, branch: &str) {
        self.git(&["push", "--quiet", "origin", branch]);
    }

    pub fn merge_no_ff(&self, branch: &str) {
        self.git(&["merge", "--quiet", "--no-ff", "--no-edit", branch]);
    }

    pub fn has_local(&self, branch: &str) -> bool {
        git_cmd(&self.work)
            .args(["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")])
            .status()
            .unwrap()
            .success()
    }

    pub fn has_on_origin(&self, branch: &str) -> bool {
        git_cmd(&self.origin)
            .args(["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")])
            .status()
            .unwrap()
            .success()
    }

    /// Install a pre-receive hook on the remote that refuses every deletion.
    #[cfg(unix)]
    pub fn decline_remote_deletes(&self) {
        use std::os::unix::fs::PermissionsExt;
        let hook = self.origin.join("hooks").join("pre-receive");
        std::fs::create_dir_all(hook.parent().unwrap()).unwrap();
        std::fs::write(
            &hook,
            "#!/bin/sh\n\
             while read old new ref; do\n\
             \tcase \"$new\" in\n\
             \t\t0000000000000000000000000000000000000000) echo \"deletion of $ref is protected\" >&2; exit 1 ;;\n\
             \tesac\n\
             done\n\
             exit 0\n",
        )
        .unwrap();
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    pub fn keeper(&self) -> GitCommand {
        GitCommand::new(true).at(&self.work)
    }
}

pub fn settings() -> KeeperSettings {
    KeeperSettings {
        workers: 4,
        ..KeeperSettings::default()
    }
}
