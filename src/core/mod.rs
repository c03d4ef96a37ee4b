//! Branch analysis and deletion engine.
//!
//! Everything in here talks to git through [`RepositoryAdapter`] and reports
//! progress through [`ProgressSink`], so the command layer (CLI, tests) can
//! plug in its own implementations.

pub mod adapter;
pub mod analysis;
pub mod cache;
pub mod deletion;
pub mod error;
pub mod merge_detector;
pub mod model;
pub mod pool;
pub mod pr_oracle;
mod progress;
pub mod sync_status;
pub mod worktree_guard;

#[cfg(test)]
pub mod testing;

pub use adapter::{RemoteDeletion, RepositoryAdapter};
pub use analysis::{AnalysisOptions, AnalysisPipeline, AnalysisReport};
pub use cache::{BranchCache, CacheKey};
pub use deletion::{DeletionCoordinator, DeletionOptions, DeletionOutcome, SkipReason};
pub use error::{KeeperError, Result};
pub use pool::CancelToken;
pub use progress::LogSink;

/// Trait for core operations to report progress without depending on the
/// terminal.
///
/// The CLI uses [`LogSink`]; tests use [`NullSink`] to suppress all output.
pub trait ProgressSink {
    /// Report an intermediate step (shown in verbose mode).
    fn on_step(&mut self, msg: &str);

    /// Report a warning (always shown).
    fn on_warning(&mut self, msg: &str);
}

/// A no-op sink that discards all progress messages.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_step(&mut self, _msg: &str) {}
    fn on_warning(&mut self, _msg: &str) {}
}
