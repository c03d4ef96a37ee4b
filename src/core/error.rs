//! Error taxonomy for the branch engine.
//!
//! The git subprocess layer speaks `anyhow`; everything that crosses the
//! [`RepositoryAdapter`](super::RepositoryAdapter) boundary is converted into a
//! [`KeeperError`] so that the analysis pipeline and the deletion coordinator
//! can decide per variant whether a failure is isolated or run-fatal.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = KeeperError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeeperError {
    /// An underlying git call failed (I/O, permissions, corruption).
    #[error("git operation '{operation}' failed{}: {message}", branch_suffix(.branch))]
    RepositoryOperation {
        operation: String,
        branch: Option<String>,
        message: String,
    },

    /// The working directory is not inside a git repository. Run-fatal.
    #[error("not a git repository: {0}")]
    RepositoryNotFound(String),

    #[error("branch '{0}' not found")]
    BranchNotFound(String),

    /// A protected or ignored branch reached a mutating stage.
    #[error("refusing to modify protected branch '{0}'")]
    ProtectionViolation(String),

    /// The remote refused the ref deletion (branch protection, hook, permissions).
    #[error("remote '{remote}' rejected deletion of '{branch}': {reason}")]
    RemoteRejected {
        remote: String,
        branch: String,
        reason: String,
    },

    #[error("branch '{branch}' has uncommitted work ({details})")]
    UncommittedChangesPresent { branch: String, details: String },

    #[error("branch '{branch}' is checked out in worktree {}", .path.display())]
    WorktreeConflict { branch: String, path: PathBuf },

    /// The persisted cache could not be read or written. Never fatal.
    #[error("branch cache unavailable: {0}")]
    CacheUnavailable(String),
}

fn branch_suffix(branch: &Option<String>) -> String {
    match branch {
        Some(b) => format!(" for branch '{b}'"),
        None => String::new(),
    }
}

impl KeeperError {
    /// Wrap a git-layer error for an operation that is not tied to one branch.
    pub fn repo(operation: &str, err: impl std::fmt::Display) -> Self {
        Self::RepositoryOperation {
            operation: operation.to_string(),
            branch: None,
            message: err.to_string(),
        }
    }

    /// Wrap a git-layer error for an operation on a specific branch.
    pub fn repo_for(operation: &str, branch: &str, err: impl std::fmt::Display) -> Self {
        Self::RepositoryOperation {
            operation: operation.to_string(),
            branch: Some(branch.to_string()),
            message: err.to_string(),
        }
    }

    /// Only a missing repository aborts a whole run; everything else is
    /// recorded against the branch it happened to.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RepositoryNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_operation_message_with_branch() {
        let err = KeeperError::repo_for("delete local ref", "feature/x", "lock held");
        assert_eq!(
            err.to_string(),
            "git operation 'delete local ref' failed for branch 'feature/x': lock held"
        );
    }

    #[test]
    fn test_repository_operation_message_without_branch() {
        let err = KeeperError::repo("list worktrees", "boom");
        assert_eq!(err.to_string(), "git operation 'list worktrees' failed: boom");
    }

    #[test]
    fn test_only_missing_repository_is_fatal() {
        assert!(KeeperError::RepositoryNotFound("/tmp".into()).is_fatal());
        assert!(!KeeperError::repo("diff", "x").is_fatal());
        assert!(!KeeperError::CacheUnavailable("corrupt".into()).is_fatal());
        assert!(!KeeperError::RemoteRejected {
            remote: "origin".into(),
            branch: "b".into(),
            reason: "protected".into(),
        }
        .is_fatal());
    }

    #[test]
    fn test_worktree_conflict_mentions_path() {
        let err = KeeperError::WorktreeConflict {
            branch: "feature/c".into(),
            path: PathBuf::from("/work/feature-c"),
        };
        assert!(err.to_string().contains("/work/feature-c"));
    }
}
