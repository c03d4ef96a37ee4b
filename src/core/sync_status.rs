//! Divergence between a local branch and its remote counterpart.

use super::adapter::{remote_ref, RepositoryAdapter};
use super::error::Result;
use super::model::{MergeVerdict, SyncStatus};

/// Where a branch's remote copy was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTip {
    pub remote: String,
    pub sha: String,
}

pub struct SyncStatusResolver<'a> {
    repo: &'a dyn RepositoryAdapter,
}

impl<'a> SyncStatusResolver<'a> {
    pub fn new(repo: &'a dyn RepositoryAdapter) -> Self {
        Self { repo }
    }

    /// Find the remote-tracking tip for `branch`, preferring `preferred`.
    ///
    /// A branch that only exists on a secondary remote is still reported, so
    /// it is never mistaken for `local-only`.
    pub fn locate_remote(
        &self,
        branch: &str,
        preferred: &str,
        remotes: &[String],
    ) -> Result<Option<RemoteTip>> {
        let ordered = std::iter::once(preferred)
            .chain(remotes.iter().map(String::as_str).filter(|r| *r != preferred));

        for remote in ordered {
            if let Some(sha) = self.repo.head_sha(&remote_ref(remote, branch))? {
                return Ok(Some(RemoteTip {
                    remote: remote.to_string(),
                    sha,
                }));
            }
        }
        Ok(None)
    }

    /// Raw ahead/behind classification of two tips.
    pub fn classify(&self, local: Option<&str>, remote: Option<&str>) -> Result<SyncStatus> {
        let Some(remote) = remote else {
            return Ok(SyncStatus::LocalOnly);
        };
        let Some(local) = local else {
            let commits = self.repo.ancestry(remote)?.len() as u32;
            return Ok(SyncStatus::Behind { commits });
        };
        if local == remote {
            return Ok(SyncStatus::Synced);
        }

        let ahead = self.repo.count_unique(local, remote)?;
        let behind = self.repo.count_unique(remote, local)?;

        Ok(match (ahead, behind) {
            (0, 0) => SyncStatus::Synced,
            (a, 0) => SyncStatus::Ahead { commits: a },
            (0, b) => SyncStatus::Behind { commits: b },
            (a, b) => SyncStatus::Diverged {
                ahead: a,
                behind: b,
            },
        })
    }
}

/// Replace the raw classification once integration is confirmed.
///
/// A merged pull request wins over git evidence. A branch whose tip is the
/// mainline tip has nothing to integrate and stays `synced`.
pub fn settle(
    raw: SyncStatus,
    verdict: &MergeVerdict,
    pr_merged: bool,
    local_sha: &str,
    mainline_sha: Option<&str>,
) -> SyncStatus {
    if pr_merged {
        return SyncStatus::MergedPr;
    }
    if !verdict.is_confirmed() {
        return raw;
    }
    if mainline_sha == Some(local_sha) {
        SyncStatus::Synced
    } else {
        SyncStatus::MergedGit
    }
}
