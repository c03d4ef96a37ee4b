//! Branch intelligence and safe deletion for git repositories.
//!
//! [`core::AnalysisPipeline`] classifies every local branch as merged, stale
//! or active and resolves its sync state against the remote.
//! [`core::DeletionCoordinator`] removes the safe ones, remote first, without
//! touching protected branches, branches checked out in a worktree, or
//! branches carrying uncommitted work.

pub mod commands;
pub mod core;
pub mod git;
pub mod logging;
pub mod settings;
pub mod styles;

pub use crate::core::{
    AnalysisOptions, AnalysisPipeline, AnalysisReport, BranchCache, CancelToken,
    DeletionCoordinator, DeletionOptions, DeletionOutcome, KeeperError, RepositoryAdapter,
};
pub use crate::git::GitCommand;
pub use crate::settings::KeeperSettings;

/// Version shown by `--version`, with the commit hash on dev builds.
pub const VERSION: &str = env!("KEEPER_VERSION_DISPLAY");
