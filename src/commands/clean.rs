use super::{cancel_on_interrupt, GlobalArgs, Session};
use crate::{
    core::deletion::requests_for,
    core::model::{DeletionReason, DeletionRequest},
    core::{DeletionCoordinator, DeletionOptions, DeletionOutcome, LogSink},
    log_info, log_warning, styles,
};
use anyhow::{Context, Result};
use dialoguer::Confirm;
use std::io::IsTerminal;
use tabled::{builder::Builder, settings::Style};

#[derive(clap::Args, Debug)]
#[command(long_about = r#"
Deletes merged branches, and stale ones with --include-stale. Each branch
is deleted on the remote first and then locally. If the remote refuses,
the local branch is kept.

Named branches are deleted only if analysis marked them merged or stale,
unless --force is given. --force never overrides protection, worktrees or
open pull requests. Branches with uncommitted work in a worktree or with
stash entries are kept unless --allow-uncommitted is given.
"#)]
pub struct Args {
    #[arg(value_name = "BRANCH", help = "Delete only these branches")]
    branches: Vec<String>,

    #[arg(short = 'n', long, help = "Show what would be deleted without deleting")]
    dry_run: bool,

    #[arg(short, long, help = "Allow deleting named branches that are still active")]
    force: bool,

    #[arg(long, help = "Delete even with uncommitted changes or stashes on the branch")]
    allow_uncommitted: bool,

    #[arg(long, help = "Also delete stale branches")]
    include_stale: bool,

    #[arg(short, long, help = "Do not ask for confirmation")]
    yes: bool,

    #[arg(long, help = "Ignore cached results for this run")]
    refresh: bool,
}

pub fn run(global: &GlobalArgs, args: Args) -> Result<i32> {
    let session = Session::open(global)?;
    let cancel = cancel_on_interrupt();
    let report = session.analyze(args.refresh, &cancel)?;
    if report.cancelled {
        return Ok(130);
    }

    let requests = build_requests(&args, &report.results);
    if requests.is_empty() {
        log_info!("Nothing to clean.");
        return Ok(0);
    }

    if !args.dry_run && !args.yes && !confirm(&requests)? {
        log_info!("Aborted.");
        return Ok(0);
    }

    let coordinator = DeletionCoordinator::new(&session.git, &session.settings).with_cache(&session.cache);
    let options = DeletionOptions {
        dry_run: args.dry_run,
        allow_uncommitted: args.allow_uncommitted,
        cancel,
    };
    let mut sink = LogSink::new(global.verbose);
    let outcomes = coordinator.delete(&requests, &report.results, &options, &mut sink);

    if !args.dry_run {
        if let Err(e) = session.cache.save() {
            log_warning!("{e}");
        }
    }

    print_outcomes(&outcomes);

    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
    if failed > 0 {
        log_warning!("{failed} branch(es) could not be deleted");
        return Ok(1);
    }
    Ok(0)
}

fn build_requests(args: &Args, results: &[crate::core::model::BranchResult]) -> Vec<DeletionRequest> {
    if args.branches.is_empty() {
        return requests_for(results, args.include_stale);
    }
    args.branches
        .iter()
        .map(|name| {
            let request = DeletionRequest::new(name.as_str(), DeletionReason::Explicit);
            if args.force {
                request.forced()
            } else {
                request
            }
        })
        .collect()
}

fn confirm(requests: &[DeletionRequest]) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        anyhow::bail!("Refusing to delete without confirmation; pass --yes to proceed");
    }
    eprintln!("Branches to delete:");
    for request in requests {
        eprintln!("  {} ({})", request.branch, request.reason);
    }
    Confirm::new()
        .with_prompt(format!("Delete {} branch(es)?", requests.len()))
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

fn describe(outcome: &DeletionOutcome, use_color: bool) -> (String, String) {
    let paint = |text: &str, f: fn(&str) -> String| {
        if use_color {
            f(text)
        } else {
            text.to_string()
        }
    };
    let kept = |details: String, kept_on: &Option<String>| match kept_on {
        Some(other) => format!("{details}; {other} copy kept"),
        None => details,
    };
    match outcome {
        DeletionOutcome::Deleted {
            remote_deleted,
            kept_on,
            ..
        } => (
            paint("deleted", styles::green),
            kept(
                if *remote_deleted {
                    "local and remote".to_string()
                } else {
                    "local".to_string()
                },
                kept_on,
            ),
        ),
        DeletionOutcome::WouldDelete { remote, kept_on, .. } => (
            paint("would delete", styles::cyan),
            kept(
                match remote {
                    Some(remote) => format!("local and {remote}"),
                    None => "local".to_string(),
                },
                kept_on,
            ),
        ),
        DeletionOutcome::Skipped { reason, .. } => (paint("skipped", styles::yellow), reason.to_string()),
        DeletionOutcome::Failed { stage, error, .. } => (
            paint("failed", styles::red),
            format!("{stage}: {error}"),
        ),
    }
}

fn print_outcomes(outcomes: &[DeletionOutcome]) {
    if outcomes.is_empty() {
        return;
    }
    let use_color = styles::colors_enabled();
    let mut builder = Builder::new();
    for outcome in outcomes {
        let (result, details) = describe(outcome, use_color);
        builder.push_record([outcome.branch().to_string(), result, details]);
    }
    let mut table = builder.build();
    table.with(Style::blank());
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::deletion::SkipReason;

    fn args(branches: &[&str], force: bool) -> Args {
        Args {
            branches: branches.iter().map(|b| b.to_string()).collect(),
            dry_run: false,
            force,
            allow_uncommitted: false,
            include_stale: false,
            yes: true,
            refresh: false,
        }
    }

    #[test]
    fn test_named_branches_become_explicit_requests() {
        let requests = build_requests(&args(&["feature/a", "feature/b"], true), &[]);
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.reason == DeletionReason::Explicit && r.force));

        let requests = build_requests(&args(&["feature/a"], false), &[]);
        assert!(!requests[0].force);
    }

    #[test]
    fn test_describe_outcomes() {
        let skipped = DeletionOutcome::Skipped {
            branch: "feature/x".to_string(),
            reason: SkipReason::OpenPullRequest(1),
        };
        assert_eq!(
            describe(&skipped, false),
            ("skipped".to_string(), "1 open pull request(s)".to_string())
        );

        let deleted = DeletionOutcome::Deleted {
            branch: "feature/x".to_string(),
            remote_deleted: true,
            kept_on: None,
        };
        assert_eq!(describe(&deleted, false).1, "local and remote");

        let local_only = DeletionOutcome::Deleted {
            branch: "feature/x".to_string(),
            remote_deleted: false,
            kept_on: Some("upstream".to_string()),
        };
        assert_eq!(describe(&local_only, false).1, "local; upstream copy kept");
    }
}
