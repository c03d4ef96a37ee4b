//! Data model shared by the analysis pipeline and the deletion coordinator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Priority tier of a branch. `Merged` is decided first; `Active` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchStatus {
    Merged,
    Stale,
    Active,
}

impl BranchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merged => "merged",
            Self::Stale => "stale",
            Self::Active => "active",
        }
    }

    /// Merged and stale branches are the only deletion candidates.
    pub fn is_deletable(&self) -> bool {
        matches!(self, Self::Merged | Self::Stale)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "merged" => Some(Self::Merged),
            "stale" => Some(Self::Stale),
            "active" => Some(Self::Active),
            _ => None,
        }
    }
}

impl fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship between a local branch tip and its remote counterpart.
///
/// `MergedGit` and `MergedPr` are terminal: once integration is confirmed they
/// replace whatever ahead/behind counts the raw comparison produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum SyncStatus {
    Synced,
    Ahead { commits: u32 },
    Behind { commits: u32 },
    Diverged { ahead: u32, behind: u32 },
    LocalOnly,
    MergedGit,
    MergedPr,
}

impl SyncStatus {
    pub fn is_merged(&self) -> bool {
        matches!(self, Self::MergedGit | Self::MergedPr)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced => f.write_str("synced"),
            Self::Ahead { commits } => write!(f, "ahead {commits}"),
            Self::Behind { commits } => write!(f, "behind {commits}"),
            Self::Diverged { .. } => f.write_str("diverged"),
            Self::LocalOnly => f.write_str("local-only"),
            Self::MergedGit => f.write_str("merged-git"),
            Self::MergedPr => f.write_str("merged-pr"),
        }
    }
}

/// How sure a merge strategy is about a positive answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

/// The individual merge-detection heuristics, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    Ancestor,
    MergeCommit,
    RevList,
    SquashPatch,
    CommitMessage,
    FullHistory,
}

impl MergeStrategy {
    pub const ALL: [MergeStrategy; 6] = [
        Self::Ancestor,
        Self::MergeCommit,
        Self::RevList,
        Self::SquashPatch,
        Self::CommitMessage,
        Self::FullHistory,
    ];

    pub fn confidence(&self) -> Confidence {
        match self {
            Self::SquashPatch | Self::CommitMessage => Confidence::Low,
            _ => Confidence::High,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ancestor => "Tip is ancestor",
            Self::MergeCommit => "Merge commit",
            Self::RevList => "Fast rev-list",
            Self::SquashPatch => "Squash merge",
            Self::CommitMessage => "Commit message",
            Self::FullHistory => "Full history",
        }
    }
}

/// Outcome of the merge detector for one branch.
///
/// A `Suspected` verdict never makes a branch `merged` on its own; it is carried
/// in the result as a hint so the caller can ask the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "kebab-case")]
pub enum MergeVerdict {
    Confirmed {
        strategy: MergeStrategy,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        corroborated_by: Option<MergeStrategy>,
    },
    Suspected {
        strategy: MergeStrategy,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        evidence: Option<String>,
    },
    NotMerged,
}

impl MergeVerdict {
    pub fn confirmed(strategy: MergeStrategy) -> Self {
        Self::Confirmed {
            strategy,
            corroborated_by: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

/// One local branch ref as listed by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub name: String,
    pub sha: String,
    /// Committer time of the tip, seconds since the epoch.
    pub commit_time: i64,
}

/// A commit as returned by history walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub parents: Vec<String>,
    pub time: i64,
    pub message: String,
}

impl CommitInfo {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// A working directory attached to the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    /// `None` for detached HEAD and bare entries.
    pub branch: Option<String>,
    pub head: Option<String>,
    /// The first entry of `git worktree list` is the main working tree.
    pub is_main: bool,
    /// Registered, but the directory no longer exists on disk.
    pub is_orphaned: bool,
}

/// Uncommitted state of a working directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub modified: usize,
    pub staged: usize,
    pub untracked: usize,
}

impl ChangeSummary {
    pub fn is_clean(&self) -> bool {
        self.modified == 0 && self.staged == 0 && self.untracked == 0
    }

    /// Compact indicator such as `M/S/U`, matching the list view legend.
    pub fn indicators(&self) -> String {
        let mut parts = Vec::new();
        if self.modified > 0 {
            parts.push("M");
        }
        if self.staged > 0 {
            parts.push("S");
        }
        if self.untracked > 0 {
            parts.push("U");
        }
        parts.join("/")
    }
}

/// Per-branch facts produced by one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub name: String,
    pub local_sha: String,
    pub remote_sha: Option<String>,
    /// Remote the `remote_sha` was read from (may differ from the configured one).
    pub remote_name: Option<String>,
    pub last_commit: DateTime<Utc>,
    pub age_days: i64,
    pub protected: bool,
    pub ignored: bool,
    pub in_worktree: bool,
    pub worktree_path: Option<PathBuf>,
    pub is_current: bool,
    /// Absent when no pull-request oracle is configured or it was unavailable.
    pub open_prs: Option<u32>,
}

/// Immutable result of analysing one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchResult {
    pub branch: Branch,
    pub status: BranchStatus,
    pub sync: SyncStatus,
    pub verdict: MergeVerdict,
    pub notes: Vec<String>,
}

impl BranchResult {
    pub fn name(&self) -> &str {
        &self.branch.name
    }

    /// Candidates for automatic cleanup: merged or stale, not protected, not
    /// ignored, not attached to a worktree, no open pull requests.
    pub fn is_deletion_candidate(&self) -> bool {
        self.status.is_deletable()
            && !self.branch.protected
            && !self.branch.ignored
            && !self.branch.in_worktree
            && self.branch.open_prs.unwrap_or(0) == 0
    }
}

/// Why a branch is being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionReason {
    Merged,
    Stale,
    /// Named by the user, regardless of analysis status.
    Explicit,
}

impl DeletionReason {
    pub fn from_status(status: BranchStatus) -> Option<Self> {
        match status {
            BranchStatus::Merged => Some(Self::Merged),
            BranchStatus::Stale => Some(Self::Stale),
            BranchStatus::Active => None,
        }
    }
}

impl fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Merged => "merged",
            Self::Stale => "stale",
            Self::Explicit => "explicit",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    pub branch: String,
    pub reason: DeletionReason,
    /// Permits an explicit request for a branch that analysis did not mark
    /// deletable. Never bypasses protection, worktree or ordering checks.
    pub force: bool,
}

impl DeletionRequest {
    pub fn new(branch: impl Into<String>, reason: DeletionReason) -> Self {
        Self {
            branch: branch.into(),
            reason,
            force: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}
