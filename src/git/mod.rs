use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Once, OnceLock};

mod adapter;
mod branch;
mod config;
mod history;
pub(crate) mod oxide;
mod refs;
mod remote;
mod stash;
mod worktree;

pub use worktree::parse_worktree_list;

static GITOXIDE_NOTICE: Once = Once::new();

pub struct GitCommand {
    pub(crate) quiet: bool,
    pub(crate) use_gitoxide: bool,
    /// Directory every git call runs in. `None` means the process cwd.
    pub(crate) repo_path: Option<PathBuf>,
    pub(crate) gix_repo: OnceLock<gix::ThreadSafeRepository>,
}

impl GitCommand {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            use_gitoxide: false,
            repo_path: None,
            gix_repo: OnceLock::new(),
        }
    }

    /// Run every git call inside `path` instead of the process cwd.
    pub fn at(mut self, path: impl Into<PathBuf>) -> Self {
        self.repo_path = Some(path.into());
        self
    }

    pub fn with_gitoxide(mut self, enabled: bool) -> Self {
        self.use_gitoxide = enabled;
        if enabled {
            GITOXIDE_NOTICE.call_once(|| {
                eprintln!("[experimental] Using gitoxide backend for git operations");
            });
        }
        self
    }

    pub fn repo_path(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }

    /// A `git` command rooted at the repository path.
    pub(crate) fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        if let Some(path) = &self.repo_path {
            cmd.current_dir(path);
        }
        cmd
    }

    /// Lazily discover and open the git repository via gitoxide.
    /// Returns a thread-local Repository handle.
    pub(crate) fn gix_repo(&self) -> Result<gix::Repository> {
        if let Some(ts) = self.gix_repo.get() {
            return Ok(ts.to_thread_local());
        }
        let start = match &self.repo_path {
            Some(path) => path.clone(),
            None => std::env::current_dir().context("Failed to get current working directory")?,
        };
        let ts = gix::ThreadSafeRepository::discover(&start)
            .context("Failed to discover git repository via gitoxide")?;
        // If another thread raced us via set(), that's fine - use whichever won
        let _ = self.gix_repo.set(ts);
        self.gix_repo
            .get()
            .map(|ts| ts.to_thread_local())
            .context("gitoxide repository handle was not initialised")
    }
}
