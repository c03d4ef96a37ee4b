use super::{cancel_on_interrupt, GlobalArgs, Session};
use crate::{
    core::model::{BranchResult, BranchStatus},
    core::AnalysisReport,
    log_info,
    settings::{SortKey, SortOrder},
    styles,
};
use anyhow::Result;
use clap::ValueEnum;
use tabled::{
    builder::Builder,
    settings::{object::Columns, Modify, Style, Width},
};

#[derive(clap::Args, Debug)]
#[command(long_about = r#"
Lists every local branch with its status, its sync state against the remote
and how old its last commit is.

Statuses:
  merged  the branch's work is already in the mainline
  stale   no commits for longer than the stale threshold
  active  everything else, including protected branches

Protected branches are listed first. A `>` marks the checked out branch and
a `+` marks branches held by a worktree.

Use --json for machine-readable output suitable for scripting.
"#)]
pub struct Args {
    #[arg(long, value_enum, default_value_t = StatusFilter::All, help = "Only show branches with this status")]
    status: StatusFilter,

    #[arg(long, value_parser = parse_sort_key, value_name = "KEY", help = "Sort by name, age, date or status")]
    sort_by: Option<SortKey>,

    #[arg(long, help = "Sort in descending order")]
    desc: bool,

    #[arg(long, help = "Ignore cached results for this run")]
    refresh: bool,

    #[arg(long, help = "Output in JSON format")]
    json: bool,

    #[arg(long, help = "Show which merge detection strategies fired")]
    stats: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFilter {
    All,
    Merged,
    Stale,
}

impl StatusFilter {
    pub fn matches(self, status: BranchStatus) -> bool {
        match self {
            Self::All => true,
            Self::Merged => status == BranchStatus::Merged,
            Self::Stale => status == BranchStatus::Stale,
        }
    }
}

pub(crate) fn parse_sort_key(value: &str) -> Result<SortKey, String> {
    SortKey::parse(value).ok_or_else(|| format!("unknown sort key '{value}' (name, age, date, status)"))
}

pub fn run(global: &GlobalArgs, args: Args) -> Result<i32> {
    let mut session = Session::open(global)?;
    if let Some(key) = args.sort_by {
        session.settings.sort_by = key;
    }
    if args.desc {
        session.settings.sort_order = SortOrder::Desc;
    }

    let cancel = cancel_on_interrupt();
    let report = session.analyze(args.refresh, &cancel)?;

    let shown: Vec<&BranchResult> = report
        .results
        .iter()
        .filter(|r| args.status.matches(r.status))
        .collect();

    if args.json {
        print_json(&report, &shown)?;
        return Ok(0);
    }

    if shown.is_empty() {
        log_info!("No branches to show.");
    } else {
        print_table(&shown);
    }

    if args.stats {
        log_info!("{}", report.merge_stats);
    }
    print_summary(&report);
    Ok(0)
}

fn print_json(report: &AnalysisReport, shown: &[&BranchResult]) -> Result<()> {
    let failures: Vec<serde_json::Value> = report
        .failures
        .iter()
        .map(|(branch, err)| {
            serde_json::json!({
                "branch": branch,
                "error": err.to_string(),
            })
        })
        .collect();
    let output = serde_json::json!({
        "mainline_sha": report.mainline_sha,
        "branches": shown,
        "failures": failures,
        "cancelled": report.cancelled,
        "merge_stats": report.merge_stats,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_table(results: &[&BranchResult]) {
    let use_color = styles::colors_enabled();

    let mut builder = Builder::new();
    let header: Vec<String> = ["", "Branch", "Status", "Sync", "Age", "Last Commit", "Notes"]
        .iter()
        .map(|h| {
            if use_color && !h.is_empty() {
                styles::dim(h)
            } else {
                h.to_string()
            }
        })
        .collect();
    builder.push_record(header);

    for result in results {
        let branch = &result.branch;
        let marker = if branch.is_current {
            ">"
        } else if branch.in_worktree {
            "+"
        } else {
            " "
        };
        let marker = if use_color && marker != " " {
            styles::cyan(marker)
        } else {
            marker.to_string()
        };
        let name = if branch.protected && use_color {
            styles::bold(&branch.name)
        } else {
            branch.name.clone()
        };

        builder.push_record([
            marker,
            name,
            styles::status(result.status, use_color),
            styles::sync(&result.sync, use_color),
            format!("{}d", branch.age_days),
            branch.last_commit.format("%Y-%m-%d").to_string(),
            result.notes.join("; "),
        ]);
    }

    let mut table = builder.build();
    table
        .with(Style::blank())
        .with(Modify::new(Columns::last()).with(Width::truncate(60).suffix("...")));

    println!("{table}");
}

fn print_summary(report: &AnalysisReport) {
    let count = |status: BranchStatus| report.results.iter().filter(|r| r.status == status).count();
    let candidates = report
        .results
        .iter()
        .filter(|r| r.is_deletion_candidate())
        .count();
    log_info!(
        "{} merged, {} stale, {} active; {} can be cleaned",
        count(BranchStatus::Merged),
        count(BranchStatus::Stale),
        count(BranchStatus::Active),
        candidates
    );
    if !report.failures.is_empty() {
        log_info!("{} branch(es) could not be analysed", report.failures.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter() {
        assert!(StatusFilter::All.matches(BranchStatus::Active));
        assert!(StatusFilter::Merged.matches(BranchStatus::Merged));
        assert!(!StatusFilter::Merged.matches(BranchStatus::Stale));
        assert!(StatusFilter::Stale.matches(BranchStatus::Stale));
    }

    #[test]
    fn test_parse_sort_key() {
        assert_eq!(parse_sort_key("status"), Ok(SortKey::Status));
        assert!(parse_sort_key("size").is_err());
    }
}
