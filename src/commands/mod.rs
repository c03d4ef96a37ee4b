/// Command modules for git-branch-keeper
///
/// Each subcommand lives in its own module with a clap `Args` struct and a
/// `run` function. Shared setup (repository discovery, settings, cache,
/// Ctrl-C wiring, the analysis progress bar) lives here.
pub mod analyze;
pub mod cache;
pub mod clean;

use crate::{
    core::{AnalysisOptions, AnalysisPipeline, AnalysisReport, BranchCache, CancelToken},
    git::GitCommand,
    log_debug, log_warning,
    logging::{init_logging, init_quiet_logging},
    settings::KeeperSettings,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "git-branch-keeper")]
#[command(version = crate::VERSION)]
#[command(about = "Find merged and stale branches and delete them safely")]
#[command(long_about = r#"
Classifies every local branch as merged, stale or active, shows how it
relates to its remote copy, and deletes the ones that are safe to delete.

A branch is never deleted while it is protected, checked out in a worktree,
has open pull requests, or carries uncommitted work. Remote copies are
deleted before local ones, and a refused remote deletion keeps the local
branch.
"#)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    #[arg(short = 'C', global = true, value_name = "PATH", help = "Run as if started in PATH")]
    pub repo: Option<PathBuf>,

    #[arg(long = "main", global = true, value_name = "BRANCH", help = "Mainline branch to detect merges against")]
    pub main_branch: Option<String>,

    #[arg(long, global = true, value_name = "NAME", help = "Remote used for sync status and deletion")]
    pub remote: Option<String>,

    #[arg(long, global = true, value_name = "DAYS", help = "Days without commits before a branch is stale")]
    pub stale_days: Option<u32>,

    #[arg(short, long, global = true, help = "Be verbose; show detailed progress")]
    pub verbose: bool,

    #[arg(short, long, global = true, conflicts_with = "verbose", help = "Only print warnings and errors")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Classify branches and show their status
    Analyze(analyze::Args),
    /// Delete merged (and optionally stale) branches
    Clean(clean::Args),
    /// Inspect or clear the analysis cache
    Cache(cache::Args),
}

/// Parse the command line, run the subcommand and return the exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();

    if cli.global.quiet {
        init_quiet_logging();
    } else {
        init_logging(cli.global.verbose);
    }

    match cli.command {
        Command::Analyze(args) => analyze::run(&cli.global, args),
        Command::Clean(args) => clean::run(&cli.global, args),
        Command::Cache(args) => cache::run(&cli.global, args),
    }
}

/// Everything a subcommand needs about the repository it runs in.
pub(crate) struct Session {
    pub git: GitCommand,
    pub settings: KeeperSettings,
    pub cache: BranchCache,
}

impl Session {
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        which::which("git").context("git executable not found in PATH")?;

        let mut git = GitCommand::new(global.quiet);
        if let Some(path) = &global.repo {
            git = git.at(path);
        }
        git.ensure_repository()?;

        let mut settings = KeeperSettings::load(&git)?;
        if let Some(main) = &global.main_branch {
            settings = settings.with_main_branch(main);
        }
        if let Some(remote) = &global.remote {
            settings.remote = remote.clone();
        }
        if let Some(days) = global.stale_days {
            settings.stale_days = days;
        }
        settings.validate()?;

        let git = git.with_gitoxide(settings.use_gitoxide);
        let common_dir = git.rev_parse_git_common_dir()?;
        let cache = BranchCache::open(BranchCache::default_path(&common_dir), settings.cache_ttl());
        log_debug!("Using cache at {}", common_dir.display());

        Ok(Self {
            git,
            settings,
            cache,
        })
    }

    /// Analyse every branch with a progress bar on interactive terminals.
    pub fn analyze(&self, refresh: bool, cancel: &CancelToken) -> Result<AnalysisReport> {
        let total = self.git.list_local_branches()?.len() as u64;
        let bar = analysis_bar(total);
        let tick = |name: &str| {
            bar.set_message(name.to_string());
            bar.inc(1);
        };

        let options = AnalysisOptions {
            refresh,
            cancel: cancel.clone(),
            progress: Some(&tick),
            ..AnalysisOptions::default()
        };
        let report = AnalysisPipeline::new(&self.git, &self.settings, &self.cache).analyze(&options);
        bar.finish_and_clear();

        let report = report?;
        for (branch, err) in &report.failures {
            log_warning!("Could not analyse {branch}: {err}");
        }
        log_debug!(
            "Cache: {} hits, {} misses",
            report.cache.hits,
            report.cache.misses
        );
        if report.cancelled {
            log_warning!("Analysis interrupted; results are partial");
        }
        Ok(report)
    }
}

fn analysis_bar(total: u64) -> ProgressBar {
    if !std::io::stderr().is_terminal() || total == 0 {
        return ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden());
    }
    let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::with_template("{spinner} Analysing branches {pos}/{len} {wide_msg}") {
        bar.set_style(style);
    }
    bar
}

/// A token that fires on the first Ctrl-C. A second Ctrl-C exits at once.
pub(crate) fn cancel_on_interrupt() -> CancelToken {
    let cancel = CancelToken::new();
    let handle = cancel.clone();
    let result = ctrlc::set_handler(move || {
        if handle.is_cancelled() {
            std::process::exit(130);
        }
        eprintln!("Interrupted; finishing in-flight work...");
        handle.cancel();
    });
    if let Err(e) = result {
        log_debug!("Could not install Ctrl-C handler: {e}");
    }
    cancel
}
