//! Per-branch analysis over the whole branch set.
//!
//! Each branch is analysed independently on the bounded pool: locate its
//! remote copy, consult the cache, otherwise run the merge detector and the
//! sync resolver, then fold in worktree and pull-request facts. Results are
//! sorted by the configured key afterwards, so worker completion order is
//! never visible.

use super::adapter::{local_ref, remote_ref, RepositoryAdapter};
use super::cache::{BranchCache, CacheEntry, CacheKey, CacheStats};
use super::error::{KeeperError, Result};
use super::merge_detector::{DetectorOptions, MergeDetector};
use super::model::{Branch, BranchRef, BranchResult, BranchStatus, MergeVerdict, SyncStatus, WorktreeInfo};
use super::pool::{run_bounded, CancelToken};
use super::pr_oracle::{NoPrOracle, PrOracle};
use super::sync_status::{settle, SyncStatusResolver};
use super::worktree_guard::{attached_to, WorktreeGuard};
use crate::settings::{KeeperSettings, Precedence, SortKey, SortOrder};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

static NO_PR_ORACLE: NoPrOracle = NoPrOracle;

/// Per-run knobs supplied by the caller.
pub struct AnalysisOptions<'a> {
    /// Ignore cached results for this run (they are kept and refreshed).
    pub refresh: bool,
    pub cancel: CancelToken,
    /// Called with each branch name as its analysis finishes.
    pub progress: Option<&'a (dyn Fn(&str) + Sync)>,
    /// Reference time for ages; fixed per run.
    pub now: DateTime<Utc>,
}

impl Default for AnalysisOptions<'_> {
    fn default() -> Self {
        Self {
            refresh: false,
            cancel: CancelToken::new(),
            progress: None,
            now: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct AnalysisReport {
    /// Sorted by the configured key.
    pub results: Vec<BranchResult>,
    pub mainline_sha: Option<String>,
    /// Branches whose analysis failed; the rest of the run is unaffected.
    pub failures: Vec<(String, KeeperError)>,
    pub cache: CacheStats,
    pub merge_stats: String,
    /// Set when the run was aborted before every branch was analysed.
    pub cancelled: bool,
}

impl AnalysisReport {
    pub fn get(&self, branch: &str) -> Option<&BranchResult> {
        self.results.iter().find(|r| r.branch.name == branch)
    }
}

/// Facts shared by every branch of one run.
struct RunContext {
    mainline_sha: Option<String>,
    remotes: Vec<String>,
    current: Option<String>,
    worktrees: Vec<WorktreeInfo>,
    now: DateTime<Utc>,
}

pub struct AnalysisPipeline<'a> {
    repo: &'a dyn RepositoryAdapter,
    settings: &'a KeeperSettings,
    cache: &'a BranchCache,
    oracle: &'a dyn PrOracle,
}

impl<'a> AnalysisPipeline<'a> {
    pub fn new(
        repo: &'a dyn RepositoryAdapter,
        settings: &'a KeeperSettings,
        cache: &'a BranchCache,
    ) -> Self {
        Self {
            repo,
            settings,
            cache,
            oracle: &NO_PR_ORACLE,
        }
    }

    pub fn with_pr_oracle(mut self, oracle: &'a dyn PrOracle) -> Self {
        self.oracle = oracle;
        self
    }

    /// Analyse every local branch.
    pub fn analyze(&self, options: &AnalysisOptions<'_>) -> Result<AnalysisReport> {
        let branches = self.repo.list_branches()?;
        self.analyze_branches(&branches, options)
    }

    /// Analyse the given branches. Only run-level failures (no repository,
    /// unreadable worktree list) are returned as errors.
    pub fn analyze_branches(
        &self,
        branches: &[BranchRef],
        options: &AnalysisOptions<'_>,
    ) -> Result<AnalysisReport> {
        let ctx = self.run_context(options.now)?;
        let detector = MergeDetector::new(
            self.repo,
            DetectorOptions {
                mainline: self.settings.main_branch.clone(),
                squash_scan_depth: self.settings.squash_scan_depth,
            },
        );

        for branch in branches {
            self.cache.track_tip(&branch.name, &branch.sha);
        }
        crate::log_debug!(
            "Analysing {} branches with {} workers",
            branches.len(),
            self.settings.workers
        );

        let outcomes = run_bounded(branches, self.settings.workers, &options.cancel, |branch| {
            let result = self.analyze_one(branch, &ctx, &detector, options.refresh);
            if let Some(progress) = options.progress {
                progress(&branch.name);
            }
            result
        });

        let mut results = Vec::new();
        let mut failures = Vec::new();
        let mut cancelled = false;
        for (branch, outcome) in branches.iter().zip(outcomes) {
            match outcome {
                Some(Ok(result)) => results.push(result),
                Some(Err(e)) if e.is_fatal() => return Err(e),
                Some(Err(e)) => {
                    crate::log_warning!("Could not analyse {}: {e}", branch.name);
                    failures.push((branch.name.clone(), e));
                }
                None => cancelled = true,
            }
        }

        sort_results(&mut results, self.settings.sort_by, self.settings.sort_order);

        if !cancelled {
            let live: HashSet<String> = branches.iter().map(|b| b.name.clone()).collect();
            self.cache.retain_branches(&live);
        }
        if let Err(e) = self.cache.save() {
            crate::log_warning!("{e}");
        }

        Ok(AnalysisReport {
            results,
            mainline_sha: ctx.mainline_sha,
            failures,
            cache: self.cache.stats(),
            merge_stats: detector.merge_stats(),
            cancelled,
        })
    }

    fn run_context(&self, now: DateTime<Utc>) -> Result<RunContext> {
        let mainline_sha = mainline_tip(self.repo, self.settings)?;
        if mainline_sha.is_none() {
            crate::log_warning!(
                "Mainline branch '{}' not found; merge detection is disabled",
                self.settings.main_branch
            );
        }

        Ok(RunContext {
            mainline_sha,
            remotes: self.repo.remotes()?,
            current: self.repo.current_branch()?,
            worktrees: WorktreeGuard::new(self.repo).snapshot()?,
            now,
        })
    }

    fn analyze_one(
        &self,
        branch_ref: &BranchRef,
        ctx: &RunContext,
        detector: &MergeDetector<'_>,
        refresh: bool,
    ) -> Result<BranchResult> {
        let name = branch_ref.name.as_str();
        let sha = branch_ref.sha.as_str();
        let protected = self.settings.is_protected(name);
        let worktree = attached_to(&ctx.worktrees, name);

        let resolver = SyncStatusResolver::new(self.repo);
        let remote = resolver
            .locate_remote(name, &self.settings.remote, &ctx.remotes)
            .map_err(|e| for_branch(e, name))?;
        let remote_sha = remote.as_ref().map(|r| r.sha.clone());

        let last_commit = DateTime::<Utc>::from_timestamp(branch_ref.commit_time, 0).unwrap_or(ctx.now);
        let age_days = (ctx.now - last_commit).num_days();

        let key = CacheKey {
            sha,
            remote_sha: remote_sha.as_deref(),
            mainline_sha: ctx.mainline_sha.as_deref(),
        };
        let cached = self.cache.get(name, &key, refresh);

        let (mut sync, verdict) = match cached {
            Some(entry) => {
                crate::log_debug!("Cache hit for {name}@{}", short(sha));
                (entry.sync_status, entry.verdict)
            }
            None => {
                let raw = resolver
                    .classify(Some(sha), remote_sha.as_deref())
                    .map_err(|e| for_branch(e, name))?;
                let verdict = match (&ctx.mainline_sha, protected) {
                    (Some(main_sha), false) => detector
                        .detect(name, sha, main_sha)
                        .map_err(|e| for_branch(e, name))?,
                    _ => MergeVerdict::NotMerged,
                };
                let sync = settle(raw, &verdict, false, sha, ctx.mainline_sha.as_deref());

                self.cache.put(
                    name,
                    CacheEntry {
                        sha: sha.to_string(),
                        remote_sha: remote_sha.clone(),
                        mainline_sha: ctx.mainline_sha.clone(),
                        status: classify_status(
                            &verdict,
                            age_days,
                            self.settings.stale_days,
                            self.settings.precedence,
                        ),
                        sync_status: sync,
                        verdict: verdict.clone(),
                        computed_at: Utc::now(),
                    },
                );
                (sync, verdict)
            }
        };

        // Age moves on without a commit, so the tier is always derived afresh.
        let mut status = if protected {
            BranchStatus::Active
        } else {
            classify_status(&verdict, age_days, self.settings.stale_days, self.settings.precedence)
        };

        let mut notes = Vec::new();
        let mut open_prs = None;

        if self.oracle.is_configured() {
            match self.oracle.pr_state(name) {
                Some(pr) => {
                    open_prs = Some(pr.open);
                    if pr.open > 0 {
                        status = BranchStatus::Active;
                        notes.push(format!(
                            "{} open pull request{}",
                            pr.open,
                            if pr.open == 1 { "" } else { "s" }
                        ));
                    } else if pr.merged && !protected {
                        status = BranchStatus::Merged;
                        sync = SyncStatus::MergedPr;
                    } else if pr.closed_unmerged {
                        notes.push("PR closed without merging".to_string());
                    }
                }
                None => crate::log_debug!("Pull request data unavailable for {name}"),
            }
        }

        if let MergeVerdict::Suspected { strategy, evidence } = &verdict {
            notes.push(match evidence {
                Some(commit) => format!("{} match in {}, unconfirmed", strategy.label(), short(commit)),
                None => format!("{} match, unconfirmed", strategy.label()),
            });
        }
        if let Some(wt) = worktree.filter(|w| w.is_orphaned) {
            notes.push(format!("worktree {} is missing on disk", wt.path.display()));
        }

        Ok(BranchResult {
            branch: Branch {
                name: name.to_string(),
                local_sha: sha.to_string(),
                remote_sha,
                remote_name: remote.map(|r| r.remote),
                last_commit,
                age_days,
                protected,
                ignored: self.settings.is_ignored(name),
                in_worktree: worktree.is_some(),
                worktree_path: worktree.map(|w| w.path.clone()),
                is_current: ctx.current.as_deref() == Some(name),
                open_prs,
            },
            status,
            sync,
            verdict,
            notes,
        })
    }
}

/// Local mainline tip, falling back to the configured remote's copy.
pub(crate) fn mainline_tip(
    repo: &dyn RepositoryAdapter,
    settings: &KeeperSettings,
) -> Result<Option<String>> {
    let main = &settings.main_branch;
    match repo.head_sha(&local_ref(main))? {
        Some(sha) => Ok(Some(sha)),
        None => repo.head_sha(&remote_ref(&settings.remote, main)),
    }
}

/// Merged and stale are exclusive tiers; `precedence` decides which wins
/// when both apply.
pub fn classify_status(
    verdict: &MergeVerdict,
    age_days: i64,
    stale_days: u32,
    precedence: Precedence,
) -> BranchStatus {
    let merged = verdict.is_confirmed();
    let stale = age_days > i64::from(stale_days);
    match (merged, stale) {
        (true, true) if precedence == Precedence::StaleFirst => BranchStatus::Stale,
        (true, _) => BranchStatus::Merged,
        (false, true) => BranchStatus::Stale,
        (false, false) => BranchStatus::Active,
    }
}

/// Protected branches first, then by `key`, then by name.
pub fn sort_results(results: &mut [BranchResult], key: SortKey, order: SortOrder) {
    results.sort_by(|a, b| {
        let by_key = match key {
            SortKey::Name => a.branch.name.to_lowercase().cmp(&b.branch.name.to_lowercase()),
            SortKey::Age => a
                .branch
                .age_days
                .cmp(&b.branch.age_days)
                .then_with(|| b.branch.last_commit.cmp(&a.branch.last_commit)),
            SortKey::Date => a.branch.last_commit.cmp(&b.branch.last_commit),
            SortKey::Status => status_rank(a.status).cmp(&status_rank(b.status)),
        };
        let by_key = match order {
            SortOrder::Asc => by_key,
            SortOrder::Desc => by_key.reverse(),
        };
        b.branch
            .protected
            .cmp(&a.branch.protected)
            .then(by_key)
            .then_with(|| a.branch.name.cmp(&b.branch.name))
    });
}

fn status_rank(status: BranchStatus) -> u8 {
    match status {
        BranchStatus::Merged => 0,
        BranchStatus::Stale => 1,
        BranchStatus::Active => 2,
    }
}

fn for_branch(err: KeeperError, branch: &str) -> KeeperError {
    match err {
        KeeperError::RepositoryOperation {
            operation,
            branch: None,
            message,
        } => KeeperError::RepositoryOperation {
            operation,
            branch: Some(branch.to_string()),
            message,
        },
        other => other,
    }
}

fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
