//! Gitoxide-based implementations of git operations.
//!
//! Each function provides a native Rust alternative to a git subprocess call.
//! These are called from `GitCommand` methods when
//! `branchKeeper.experimental.gitoxide` is enabled.

use anyhow::{Context, Result};
use gix::Repository;
use std::collections::HashSet;
use std::path::PathBuf;

// --- Repository state ---

/// gitoxide equivalent of `git rev-parse --git-common-dir`
pub fn rev_parse_git_common_dir(repo: &Repository) -> Result<PathBuf> {
    Ok(repo.common_dir().to_path_buf())
}

// --- References & branches ---

/// gitoxide equivalent of `git symbolic-ref --quiet --short HEAD`
pub fn symbolic_ref_short_head(repo: &Repository) -> Result<Option<String>> {
    let head = repo.head_ref().context("Failed to read HEAD")?;
    Ok(head.map(|reference| reference.name().shorten().to_string()))
}

/// gitoxide equivalent of `git rev-parse --verify --quiet <ref_name>^{commit}`
pub fn resolve_ref(repo: &Repository, ref_name: &str) -> Result<Option<String>> {
    let Some(mut reference) = repo.try_find_reference(ref_name)? else {
        return Ok(None);
    };
    let id = reference
        .peel_to_id()
        .with_context(|| format!("Failed to peel '{ref_name}'"))?;
    Ok(Some(id.to_string()))
}

/// gitoxide equivalent of `git merge-base <a> <b>`
pub fn merge_base(repo: &Repository, a: &str, b: &str) -> Result<Option<String>> {
    let a_id = repo
        .rev_parse_single(a.as_bytes())
        .with_context(|| format!("Failed to resolve '{a}'"))?;
    let b_id = repo
        .rev_parse_single(b.as_bytes())
        .with_context(|| format!("Failed to resolve '{b}'"))?;
    // An error here means the histories share no commit.
    Ok(repo
        .merge_base(a_id.detach(), b_id.detach())
        .ok()
        .map(|id| id.to_string()))
}

// --- Config reading ---

/// gitoxide equivalent of `git config --get <key>`
pub fn config_get(repo: &Repository, key: &str) -> Result<Option<String>> {
    let config = repo.config_snapshot();
    Ok(config.string(key).map(|v| v.to_string()))
}

/// gitoxide equivalent of `git config --get-all <key>`
pub fn config_get_all(repo: &Repository, key: &str) -> Result<Vec<String>> {
    let config = repo.config_snapshot();
    Ok(config
        .strings(key)
        .unwrap_or_default()
        .into_iter()
        .map(|v| v.to_string())
        .collect())
}

// --- Commit graph ---

fn ancestors(repo: &Repository, rev: &str) -> Result<HashSet<gix::ObjectId>> {
    let id = repo
        .rev_parse_single(rev.as_bytes())
        .with_context(|| format!("Failed to resolve '{rev}'"))?;
    let walk = repo
        .rev_walk([id.detach()])
        .all()
        .context("Failed to start revision walk")?;

    let mut seen = HashSet::new();
    for info_result in walk {
        let info = info_result.context("Failed during revision walk")?;
        seen.insert(info.id);
    }
    Ok(seen)
}

/// gitoxide equivalent of `git rev-list --count <range>`
///
/// Supports `A..B` (commits in B not in A) and a single ref.
pub fn rev_list_count(repo: &Repository, range: &str) -> Result<u32> {
    let count = match range.split_once("..") {
        Some((from, to)) => {
            let excluded = ancestors(repo, from)?;
            ancestors(repo, to)?
                .iter()
                .filter(|id| !excluded.contains(*id))
                .count()
        }
        None => ancestors(repo, range)?.len(),
    };
    u32::try_from(count).context("Commit count does not fit in u32")
}

// --- Remote info (local data) ---

/// gitoxide equivalent of `git remote`
pub fn remote_list(repo: &Repository) -> Result<Vec<String>> {
    Ok(repo
        .remote_names()
        .iter()
        .map(|name| name.to_string())
        .collect())
}
