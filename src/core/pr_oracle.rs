//! Optional pull-request lookups.
//!
//! The engine never requires an oracle. Without one, or when a lookup is
//! unavailable, no PR protection is applied and `open_prs` stays `None`.

use std::collections::HashMap;

/// What the hosting service knows about a branch's pull requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrState {
    pub open: u32,
    /// A pull request from this branch was merged.
    pub merged: bool,
    /// A pull request from this branch was closed without merging.
    pub closed_unmerged: bool,
}

pub trait PrOracle: Send + Sync {
    /// `None` when the service could not answer for this branch.
    fn pr_state(&self, branch: &str) -> Option<PrState>;

    fn open_pr_count(&self, branch: &str) -> Option<u32> {
        self.pr_state(branch).map(|s| s.open)
    }

    /// `false` for the no-op oracle, so callers can tell "not configured"
    /// from "configured but unavailable".
    fn is_configured(&self) -> bool {
        true
    }
}

/// Used when no hosting service is configured.
pub struct NoPrOracle;

impl PrOracle for NoPrOracle {
    fn pr_state(&self, _branch: &str) -> Option<PrState> {
        None
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// Pull-request data fetched up front, e.g. one API call per run.
/// Branches missing from the snapshot have no pull requests.
#[derive(Debug, Default, Clone)]
pub struct PrSnapshot {
    states: HashMap<String, PrState>,
}

impl PrSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, branch: impl Into<String>, state: PrState) {
        self.states.insert(branch.into(), state);
    }
}

impl PrOracle for PrSnapshot {
    fn pr_state(&self, branch: &str) -> Option<PrState> {
        Some(self.states.get(branch).copied().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_oracle_is_unavailable_and_unconfigured() {
        assert_eq!(NoPrOracle.open_pr_count("feature/x"), None);
        assert!(!NoPrOracle.is_configured());
    }

    #[test]
    fn test_snapshot_defaults_to_no_prs() {
        let mut snapshot = PrSnapshot::new();
        snapshot.insert(
            "feature/open",
            PrState {
                open: 2,
                ..PrState::default()
            },
        );
        assert_eq!(snapshot.open_pr_count("feature/open"), Some(2));
        assert_eq!(snapshot.open_pr_count("feature/other"), Some(0));
        assert!(snapshot.is_configured());
    }
}
