//! Decides whether a branch's work is already present in the mainline.
//!
//! Strategies run cheapest first and stop at the first high-confidence hit:
//!
//! 1. tip is an ancestor of the mainline tip
//! 2. a recent mainline merge commit has the tip as a parent
//! 3. no commits are unique to the branch
//! 4. the branch patch matches a recent mainline commit (squash merge)
//! 5. every commit of the branch is in the mainline history
//!
//! A squash match is only a hint. It becomes a confirmed merge when a
//! merge-message on the mainline names the branch; otherwise the verdict is
//! `Suspected` and the branch is not treated as merged.

use super::adapter::RepositoryAdapter;
use super::error::Result;
use super::model::{CommitInfo, Confidence, MergeStrategy, MergeVerdict};
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Recent mainline commits searched for merge commits and merge messages.
pub const MESSAGE_SCAN_DEPTH: usize = 100;

/// Branch patches shorter than this are too generic to match reliably.
const MIN_SQUASH_DIFF: usize = 100;

/// Containment matches are only accepted above this size.
const MIN_CONTAINED_DIFF: usize = 200;

const MIN_CONTAINED_RATIO: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct DetectorOptions {
    pub mainline: String,
    pub squash_scan_depth: usize,
}

type MemoKey = (String, String, String);

pub struct MergeDetector<'a> {
    repo: &'a dyn RepositoryAdapter,
    options: DetectorOptions,
    memo: Mutex<HashMap<MemoKey, MergeVerdict>>,
    hits: [AtomicUsize; 6],
}

impl<'a> MergeDetector<'a> {
    pub fn new(repo: &'a dyn RepositoryAdapter, options: DetectorOptions) -> Self {
        Self {
            repo,
            options,
            memo: Mutex::new(HashMap::new()),
            hits: Default::default(),
        }
    }

    /// Classify `branch` (tip `branch_sha`) against the mainline tip.
    pub fn detect(&self, branch: &str, branch_sha: &str, mainline_sha: &str) -> Result<MergeVerdict> {
        if branch == self.options.mainline {
            crate::log_debug!("Skipping merge check: {branch} is the mainline");
            return Ok(MergeVerdict::NotMerged);
        }

        let key = (
            branch.to_string(),
            branch_sha.to_string(),
            mainline_sha.to_string(),
        );
        if let Some(verdict) = self.memo_get(&key) {
            return Ok(verdict);
        }

        let verdict = self.run_strategies(branch, branch_sha, mainline_sha)?;
        if let MergeVerdict::Confirmed { strategy, .. } = &verdict {
            self.hits[*strategy as usize].fetch_add(1, Ordering::Relaxed);
        }

        self.memo
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, verdict.clone());
        Ok(verdict)
    }

    fn memo_get(&self, key: &MemoKey) -> Option<MergeVerdict> {
        self.memo
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn run_strategies(
        &self,
        branch: &str,
        branch_sha: &str,
        mainline_sha: &str,
    ) -> Result<MergeVerdict> {
        if self.repo.is_ancestor(branch_sha, mainline_sha)? {
            return Ok(self.hit(branch, MergeStrategy::Ancestor));
        }

        let recent = self
            .repo
            .commits_since(mainline_sha, Some(MESSAGE_SCAN_DEPTH))?;

        if has_merge_parent(&recent, branch_sha) {
            return Ok(self.hit(branch, MergeStrategy::MergeCommit));
        }

        if self.repo.count_unique(branch_sha, mainline_sha)? == 0 {
            return Ok(self.hit(branch, MergeStrategy::RevList));
        }

        let squash = self.find_squash_commit(branch_sha, mainline_sha)?;
        let message = find_merge_message(&recent, branch);

        if let Some(commit) = &squash {
            if message.is_some() {
                crate::log_debug!(
                    "[{}] {branch} squash-merged in {}, corroborated by merge message",
                    MergeStrategy::SquashPatch.label(),
                    short(commit)
                );
                return Ok(MergeVerdict::Confirmed {
                    strategy: MergeStrategy::SquashPatch,
                    corroborated_by: Some(MergeStrategy::CommitMessage),
                });
            }
        }

        if self.full_history_contained(branch_sha, mainline_sha)? {
            return Ok(self.hit(branch, MergeStrategy::FullHistory));
        }

        if let Some(commit) = squash {
            crate::log_debug!(
                "[{}] {branch} patch found in {} but uncorroborated",
                MergeStrategy::SquashPatch.label(),
                short(&commit)
            );
            return Ok(MergeVerdict::Suspected {
                strategy: MergeStrategy::SquashPatch,
                evidence: Some(commit),
            });
        }

        if let Some(commit) = message {
            crate::log_debug!(
                "[{}] {branch} named by merge message in {} but has unmerged commits",
                MergeStrategy::CommitMessage.label(),
                short(&commit)
            );
            return Ok(MergeVerdict::Suspected {
                strategy: MergeStrategy::CommitMessage,
                evidence: Some(commit),
            });
        }

        Ok(MergeVerdict::NotMerged)
    }

    fn hit(&self, branch: &str, strategy: MergeStrategy) -> MergeVerdict {
        debug_assert_eq!(strategy.confidence(), Confidence::High);
        crate::log_debug!("[{}] {branch} is merged", strategy.label());
        MergeVerdict::confirmed(strategy)
    }

    /// Search recent mainline commits for one whose patch is the branch patch.
    fn find_squash_commit(&self, branch_sha: &str, mainline_sha: &str) -> Result<Option<String>> {
        let Some(base) = self.repo.merge_base(mainline_sha, branch_sha)? else {
            return Ok(None);
        };
        let branch_diff = self.repo.diff(&base, branch_sha)?;
        if branch_diff.len() < MIN_SQUASH_DIFF {
            return Ok(None);
        }

        let candidates = self
            .repo
            .commits_since(mainline_sha, Some(self.options.squash_scan_depth))?;

        for commit in candidates.iter().filter(|c| !c.is_merge()) {
            let patch = match self.repo.commit_patch(&commit.sha) {
                Ok(patch) => patch,
                Err(e) => {
                    crate::log_debug!("Skipping commit {} in squash scan: {e}", short(&commit.sha));
                    continue;
                }
            };
            if patch_matches(&branch_diff, &patch) {
                return Ok(Some(commit.sha.clone()));
            }
        }
        Ok(None)
    }

    fn full_history_contained(&self, branch_sha: &str, mainline_sha: &str) -> Result<bool> {
        let mainline = self.repo.ancestry(mainline_sha)?;
        let branch = self.repo.ancestry(branch_sha)?;
        Ok(branch.is_subset(&mainline))
    }

    /// Confirmed merges per strategy, in strategy order.
    pub fn stats(&self) -> Vec<(MergeStrategy, usize)> {
        MergeStrategy::ALL
            .iter()
            .map(|s| (*s, self.hits[*s as usize].load(Ordering::Relaxed)))
            .collect()
    }

    /// One-line summary such as `Merges detected by: Tip is ancestor: 3`.
    pub fn merge_stats(&self) -> String {
        let parts: Vec<String> = self
            .stats()
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(s, n)| format!("{}: {n}", s.label()))
            .collect();
        if parts.is_empty() {
            "No merges detected".to_string()
        } else {
            format!("Merges detected by: {}", parts.join(", "))
        }
    }
}

fn has_merge_parent(commits: &[CommitInfo], sha: &str) -> bool {
    commits
        .iter()
        .filter(|c| c.is_merge())
        .any(|c| c.parents.iter().skip(1).any(|p| p == sha))
}

/// Exact equality, or for larger patches, containment covering most of the commit.
pub fn patch_matches(branch_diff: &str, commit_patch: &str) -> bool {
    if commit_patch.is_empty() {
        return false;
    }
    if branch_diff == commit_patch {
        return true;
    }
    branch_diff.len() > MIN_CONTAINED_DIFF
        && commit_patch.contains(branch_diff)
        && branch_diff.len() as f64 / commit_patch.len() as f64 > MIN_CONTAINED_RATIO
}

pub fn merge_message_patterns(branch: &str) -> Vec<Regex> {
    let name = regex::escape(branch);
    [
        format!(r"Merge branch '{name}'"),
        format!(r"(?m)Merge pull request .* from \S*/{name}(\s|$)"),
        format!(r"(?m)Merge pull request .* from \S*:{name}(\s|$)"),
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
}

/// First commit whose message records a merge of `branch`.
fn find_merge_message(commits: &[CommitInfo], branch: &str) -> Option<String> {
    let patterns = merge_message_patterns(branch);
    commits
        .iter()
        .find(|c| patterns.iter().any(|p| p.is_match(&c.message)))
        .map(|c| c.sha.clone())
}

fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
