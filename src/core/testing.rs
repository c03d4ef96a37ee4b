//! In-memory repository used by the engine's unit tests.

use super::adapter::{RemoteDeletion, RepositoryAdapter};
use super::error::{KeeperError, Result};
use super::model::{BranchRef, ChangeSummary, CommitInfo, WorktreeInfo};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const DAY: i64 = 86_400;

#[derive(Clone)]
struct FakeCommit {
    parents: Vec<String>,
    time: i64,
    message: String,
    patch: String,
}

#[derive(Default)]
struct State {
    commits: HashMap<String, FakeCommit>,
    refs: BTreeMap<String, String>,
    remotes: Vec<String>,
    current: Option<String>,
    worktrees: Vec<WorktreeInfo>,
    dirty: HashMap<PathBuf, ChangeSummary>,
    stashes: HashMap<String, Vec<String>>,
    rejecting: HashSet<(String, String)>,
    failing: HashSet<&'static str>,
    journal: Vec<String>,
    calls: HashMap<&'static str, usize>,
}

/// A tiny commit graph with refs, worktrees and a journal of mutations.
#[derive(Default)]
pub struct FakeRepository {
    state: Mutex<State>,
}

impl FakeRepository {
    pub fn new() -> Self {
        let repo = Self::default();
        repo.state().remotes.push("origin".to_string());
        repo
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a commit `days_ago` days old. `patch` is what `diff` reports for it.
    pub fn commit(&self, sha: &str, parents: &[&str], days_ago: i64, message: &str, patch: &str) {
        self.state().commits.insert(
            sha.to_string(),
            FakeCommit {
                parents: parents.iter().map(|p| p.to_string()).collect(),
                time: Utc::now().timestamp() - days_ago * DAY,
                message: message.to_string(),
                patch: patch.to_string(),
            },
        );
    }

    pub fn branch(&self, name: &str, sha: &str) {
        self.state()
            .refs
            .insert(format!("refs/heads/{name}"), sha.to_string());
    }

    pub fn remote_branch(&self, remote: &str, name: &str, sha: &str) {
        let mut state = self.state();
        if !state.remotes.iter().any(|r| r == remote) {
            state.remotes.push(remote.to_string());
        }
        state
            .refs
            .insert(format!("refs/remotes/{remote}/{name}"), sha.to_string());
    }

    pub fn checkout(&self, name: &str) {
        self.state().current = Some(name.to_string());
    }

    pub fn worktree(&self, path: &str, branch: &str) {
        let mut state = self.state();
        let is_main = state.worktrees.is_empty();
        state.worktrees.push(WorktreeInfo {
            path: PathBuf::from(path),
            branch: Some(branch.to_string()),
            head: None,
            is_main,
            is_orphaned: false,
        });
    }

    pub fn dirty(&self, path: &str, changes: ChangeSummary) {
        self.state().dirty.insert(PathBuf::from(path), changes);
    }

    pub fn stash(&self, branch: &str, entry: &str) {
        self.state()
            .stashes
            .entry(branch.to_string())
            .or_default()
            .push(entry.to_string());
    }

    /// Make the remote refuse to delete `branch`.
    pub fn reject_remote_delete(&self, remote: &str, branch: &str) {
        self.state()
            .rejecting
            .insert((remote.to_string(), branch.to_string()));
    }

    /// Make every call of the named adapter method fail.
    pub fn fail(&self, operation: &'static str) {
        self.state().failing.insert(operation);
    }

    pub fn has_ref(&self, reference: &str) -> bool {
        self.state().refs.contains_key(reference)
    }

    /// Mutations in the order they happened, e.g. `push-delete origin/x`.
    pub fn journal(&self) -> Vec<String> {
        self.state().journal.clone()
    }

    pub fn calls(&self, operation: &'static str) -> usize {
        self.state().calls.get(operation).copied().unwrap_or(0)
    }

    fn enter(&self, operation: &'static str) -> Result<MutexGuard<'_, State>> {
        let mut state = self.state();
        *state.calls.entry(operation).or_default() += 1;
        if state.failing.contains(operation) {
            return Err(KeeperError::repo(operation, "injected failure"));
        }
        Ok(state)
    }
}

impl State {
    fn resolve(&self, rev: &str) -> Option<String> {
        if let Some(sha) = self.refs.get(rev) {
            return Some(sha.clone());
        }
        self.commits.contains_key(rev).then(|| rev.to_string())
    }

    fn reachable(&self, rev: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<String> = self.resolve(rev).into_iter().collect();
        while let Some(sha) = queue.pop_front() {
            if !seen.insert(sha.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&sha) {
                queue.extend(commit.parents.iter().cloned());
            }
        }
        seen
    }

    /// Commits reachable from `include` but not `exclude`, newest first.
    fn unique(&self, include: &str, exclude: &str) -> Vec<String> {
        let excluded = self.reachable(exclude);
        let mut shas: Vec<String> = self
            .reachable(include)
            .into_iter()
            .filter(|sha| !excluded.contains(sha))
            .collect();
        shas.sort_by_key(|sha| {
            std::cmp::Reverse(self.commits.get(sha).map(|c| c.time).unwrap_or(0))
        });
        shas
    }
}

impl RepositoryAdapter for FakeRepository {
    fn list_branches(&self) -> Result<Vec<BranchRef>> {
        let state = self.enter("list_branches")?;
        Ok(state
            .refs
            .iter()
            .filter_map(|(name, sha)| {
                let short = name.strip_prefix("refs/heads/")?;
                Some(BranchRef {
                    name: short.to_string(),
                    sha: sha.clone(),
                    commit_time: state.commits.get(sha).map(|c| c.time).unwrap_or(0),
                })
            })
            .collect())
    }

    fn head_sha(&self, reference: &str) -> Result<Option<String>> {
        Ok(self.enter("head_sha")?.refs.get(reference).cloned())
    }

    fn remotes(&self) -> Result<Vec<String>> {
        Ok(self.enter("remotes")?.remotes.clone())
    }

    fn current_branch(&self) -> Result<Option<String>> {
        Ok(self.enter("current_branch")?.current.clone())
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>> {
        let state = self.enter("merge_base")?;
        let other = state.reachable(b);
        let mut common: Vec<String> = state
            .reachable(a)
            .into_iter()
            .filter(|sha| other.contains(sha))
            .collect();
        common.sort_by_key(|sha| {
            std::cmp::Reverse(state.commits.get(sha).map(|c| c.time).unwrap_or(0))
        });
        Ok(common.into_iter().next())
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let state = self.enter("is_ancestor")?;
        let Some(sha) = state.resolve(ancestor) else {
            return Ok(false);
        };
        Ok(state.reachable(descendant).contains(&sha))
    }

    fn count_unique(&self, include: &str, exclude: &str) -> Result<u32> {
        let state = self.enter("count_unique")?;
        Ok(state.unique(include, exclude).len() as u32)
    }

    fn diff(&self, a: &str, b: &str) -> Result<String> {
        let state = self.enter("diff")?;
        let mut shas = state.unique(b, a);
        shas.reverse();
        Ok(shas
            .iter()
            .filter_map(|sha| state.commits.get(sha).map(|c| c.patch.as_str()))
            .collect())
    }

    fn commit_patch(&self, sha: &str) -> Result<String> {
        let state = self.enter("commit_patch")?;
        Ok(state
            .commits
            .get(sha)
            .map(|c| c.patch.clone())
            .unwrap_or_default())
    }

    fn commits_since(&self, reference: &str, limit: Option<usize>) -> Result<Vec<CommitInfo>> {
        let state = self.enter("commits_since")?;
        let mut shas: Vec<String> = state.reachable(reference).into_iter().collect();
        shas.sort_by_key(|sha| {
            std::cmp::Reverse(state.commits.get(sha).map(|c| c.time).unwrap_or(0))
        });
        Ok(shas
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .filter_map(|sha| {
                let commit = state.commits.get(&sha)?;
                Some(CommitInfo {
                    sha,
                    parents: commit.parents.clone(),
                    time: commit.time,
                    message: commit.message.clone(),
                })
            })
            .collect())
    }

    fn ancestry(&self, reference: &str) -> Result<HashSet<String>> {
        Ok(self.enter("ancestry")?.reachable(reference))
    }

    fn list_worktrees(&self) -> Result<Vec<WorktreeInfo>> {
        Ok(self.enter("list_worktrees")?.worktrees.clone())
    }

    fn working_tree_changes(&self, path: &Path) -> Result<ChangeSummary> {
        let state = self.enter("working_tree_changes")?;
        Ok(state.dirty.get(path).copied().unwrap_or_default())
    }

    fn stashes_for_branch(&self, branch: &str) -> Result<Vec<String>> {
        let state = self.enter("stashes_for_branch")?;
        Ok(state.stashes.get(branch).cloned().unwrap_or_default())
    }

    fn delete_local_ref(&self, branch: &str) -> Result<()> {
        let mut state = self.enter("delete_local_ref")?;
        if state.refs.remove(&format!("refs/heads/{branch}")).is_none() {
            return Err(KeeperError::BranchNotFound(branch.to_string()));
        }
        state.journal.push(format!("branch-delete {branch}"));
        Ok(())
    }

    fn delete_remote_ref(&self, remote: &str, branch: &str) -> Result<RemoteDeletion> {
        let mut state = self.enter("delete_remote_ref")?;
        state.journal.push(format!("push-delete {remote}/{branch}"));
        if state
            .rejecting
            .contains(&(remote.to_string(), branch.to_string()))
        {
            return Err(KeeperError::RemoteRejected {
                remote: remote.to_string(),
                branch: branch.to_string(),
                reason: "protected branch hook declined".to_string(),
            });
        }
        match state
            .refs
            .remove(&format!("refs/remotes/{remote}/{branch}"))
        {
            Some(_) => Ok(RemoteDeletion::Deleted),
            None => Ok(RemoteDeletion::AlreadyAbsent),
        }
    }
}
